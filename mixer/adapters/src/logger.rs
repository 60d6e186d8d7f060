//! Emits metric values as log events.

use ahash::AHashMap as HashMap;
use linkerd_mixer_core::{
    adapter::{Aspect, Builder, Env, MetricValue, MetricsAspect, MetricsBuilder},
    descriptor::MetricDefinition,
    params, ConfigErrors, Params,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerParams {
    pub level: Level,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
}

#[derive(Clone, Debug, Default)]
pub struct Logger(());

#[derive(Debug)]
struct Recorder {
    span: tracing::Span,
    level: Level,
    metrics: HashMap<String, Arc<MetricDefinition>>,
}

// === impl Logger ===

impl Logger {
    pub fn new() -> Self {
        Self(())
    }
}

impl Builder for Logger {
    fn name(&self) -> &str {
        "logger"
    }

    fn description(&self) -> &str {
        "Logs metric values"
    }

    fn default_config(&self) -> Params {
        params::encode(&LoggerParams::default())
    }

    fn validate_config(&self, params: &Params) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if let Err(error) = params::decode::<LoggerParams>(params) {
            errors.append("", error);
        }
        errors
    }

    fn metrics(&self) -> Option<&dyn MetricsBuilder> {
        Some(self)
    }
}

impl MetricsBuilder for Logger {
    fn new_metrics_aspect(
        &self,
        env: &Env,
        params: &Params,
        metrics: &HashMap<String, Arc<MetricDefinition>>,
    ) -> anyhow::Result<Box<dyn MetricsAspect>> {
        let LoggerParams { level } = params::decode(params)?;
        Ok(Box::new(Recorder {
            span: env.span().clone(),
            level,
            metrics: metrics.clone(),
        }))
    }
}

// === impl Recorder ===

impl Aspect for Recorder {
    fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

impl MetricsAspect for Recorder {
    fn record(&self, values: Vec<MetricValue>) -> anyhow::Result<()> {
        let _enter = self.span.enter();
        for MetricValue {
            definition,
            labels,
            value,
        } in values
        {
            if !self.metrics.contains_key(&definition.name) {
                anyhow::bail!("metric {:?} was not configured", definition.name);
            }

            let name = &definition.name;
            let kind = definition.kind;
            match self.level {
                Level::Trace => trace!(metric = %name, ?kind, %value, ?labels),
                Level::Debug => debug!(metric = %name, ?kind, %value, ?labels),
                Level::Info => info!(metric = %name, ?kind, %value, ?labels),
            }
        }
        Ok(())
    }
}
