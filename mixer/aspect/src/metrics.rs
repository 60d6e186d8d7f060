use crate::{decode_params, Error, Manager, Method, Output, Wrapper};
use ahash::AHashMap as HashMap;
use linkerd_mixer_config::Combined;
use linkerd_mixer_core::{
    adapter::{Builder, Env, MetricValue, MetricsAspect},
    attribute::Bag,
    descriptor::{self, MetricDefinition},
    expr::{self, Evaluator},
    params, AspectValidator, ConfigErrors, Kind, Params, Status,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::warn;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsParams {
    pub metrics: Vec<MetricParams>,
}

/// Maps request attributes onto a declared metric.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricParams {
    pub descriptor_name: String,

    /// Produces the metric's value.
    pub value: String,

    /// Produces each label's value, keyed by label name.
    pub labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default)]
pub struct MetricsManager(());

struct MetricsWrapper {
    aspect: Box<dyn MetricsAspect>,
    metadata: Vec<MetricInfo>,
}

struct MetricInfo {
    definition: Arc<MetricDefinition>,
    value: String,
    labels: BTreeMap<String, String>,
}

// === impl MetricsManager ===

impl MetricsManager {
    pub fn new() -> Self {
        Self(())
    }
}

impl AspectValidator for MetricsManager {
    fn default_config(&self) -> Params {
        params::encode(&MetricsParams::default())
    }

    fn validate_config(
        &self,
        params: &Params,
        eval: &dyn Evaluator,
        descriptors: &descriptor::Finder,
    ) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        let params = match params::decode::<MetricsParams>(params) {
            Ok(params) => params,
            Err(error) => {
                errors.append("", error);
                return errors;
            }
        };

        for (i, metric) in params.metrics.iter().enumerate() {
            let field = format!("metrics[{}]", i);

            let Some(desc) = descriptors.get_metric(&metric.descriptor_name) else {
                errors.append(
                    format!("{}.descriptor_name", field),
                    format!("unknown metric descriptor {:?}", metric.descriptor_name),
                );
                continue;
            };

            if let Err(error) = eval.validate(&metric.value) {
                errors.append(format!("{}.value", field), error);
            }

            for label in desc.labels.keys() {
                if !metric.labels.contains_key(label) {
                    errors.append(
                        format!("{}.labels", field),
                        format!("missing label {:?} of metric {:?}", label, desc.name),
                    );
                }
            }
            for (label, expr) in &metric.labels {
                let field = format!("{}.labels.{}", field, label);
                if !desc.labels.contains_key(label) {
                    errors.append(
                        field,
                        format!("metric {:?} has no label {:?}", desc.name, label),
                    );
                } else if let Err(error) = eval.validate(expr) {
                    errors.append(field, error);
                }
            }
        }
        errors
    }
}

impl Manager for MetricsManager {
    fn kind(&self) -> Kind {
        Kind::METRICS
    }

    fn new_aspect(
        &self,
        combined: &Combined,
        builder: &dyn Builder,
        env: &Env,
        descriptors: &descriptor::Finder,
    ) -> Result<Box<dyn Wrapper>, Error> {
        let MetricsParams { metrics } = decode_params(Kind::METRICS, &combined.aspect.params)?;
        let metrics_builder = builder.metrics().ok_or_else(|| Error::BuilderMismatch {
            kind: Kind::METRICS,
            builder: builder.name().to_string(),
        })?;

        let mut definitions = HashMap::with_capacity(metrics.len());
        let mut metadata = Vec::with_capacity(metrics.len());
        for metric in metrics {
            let desc = descriptors
                .get_metric(&metric.descriptor_name)
                .ok_or_else(|| Error::UnknownMetric(metric.descriptor_name.clone()))?;
            let definition = Arc::new(MetricDefinition::try_from(desc)?);
            definitions.insert(definition.name.clone(), definition.clone());
            metadata.push(MetricInfo {
                definition,
                value: metric.value,
                labels: metric.labels,
            });
        }

        let aspect = metrics_builder
            .new_metrics_aspect(env, &combined.builder.params, &definitions)
            .map_err(Error::Adapter)?;
        Ok(Box::new(MetricsWrapper { aspect, metadata }))
    }
}

// === impl MetricsWrapper ===

impl Wrapper for MetricsWrapper {
    fn execute(&self, attrs: &dyn Bag, eval: &dyn Evaluator, _: Method) -> Output {
        let mut values = Vec::with_capacity(self.metadata.len());
        let mut errors = Vec::new();
        for info in &self.metadata {
            match info.evaluate(attrs, eval) {
                Ok(value) => values.push(value),
                Err(error) => {
                    warn!(metric = %info.definition.name, %error, "Failed to evaluate metric");
                    errors.push(format!("metric {}: {}", info.definition.name, error));
                }
            }
        }

        if !values.is_empty() {
            if let Err(error) = self.aspect.record(values) {
                warn!(%error, "Failed to record metrics");
                errors.push(error.to_string());
            }
        }

        if errors.is_empty() {
            return Output::ok();
        }
        Status::internal(errors.join("; ")).into()
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.aspect.close()
    }
}

// === impl MetricInfo ===

impl MetricInfo {
    fn evaluate(&self, attrs: &dyn Bag, eval: &dyn Evaluator) -> Result<MetricValue, expr::Error> {
        let value = eval.eval(&self.value, attrs)?;
        let labels = self
            .labels
            .iter()
            .map(|(label, expr)| Ok((label.clone(), eval.eval(expr, attrs)?)))
            .collect::<Result<_, expr::Error>>()?;
        Ok(MetricValue {
            definition: self.definition.clone(),
            labels,
            value,
        })
    }
}
