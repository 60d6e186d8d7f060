//! Contracts between the aspect framework and the adapters that implement
//! aspects.
//!
//! A [`Builder`] is the long-lived entry point of an adapter. It advertises
//! which aspect kinds it can build through capability accessors; a manager
//! asks for the capability matching its kind and fails when the builder does
//! not provide it.

use crate::{
    attribute::Value as AttrValue, descriptor::MetricDefinition, BuilderFinder, ConfigErrors,
    Kind, Params, Status,
};
use ahash::AHashMap as HashMap;
use anyhow::Result;
use std::{collections::BTreeMap, fmt, sync::Arc};

/// The environment handed to adapters when aspects are built.
#[derive(Clone, Debug)]
pub struct Env {
    span: tracing::Span,
}

/// A live aspect owned by exactly one wrapper.
pub trait Aspect: Send + Sync {
    /// Releases the aspect's resources.
    fn close(self: Box<Self>) -> Result<()>;
}

pub trait DenialsAspect: Aspect {
    fn deny(&self) -> Status;
}

pub trait ListsAspect: Aspect {
    /// Returns whether `symbol` passes the list check.
    fn check_list(&self, symbol: &str) -> Result<bool>;
}

pub trait MetricsAspect: Aspect {
    fn record(&self, values: Vec<MetricValue>) -> Result<()>;
}

/// A single metric observation.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricValue {
    pub definition: Arc<MetricDefinition>,
    pub labels: BTreeMap<String, AttrValue>,
    pub value: AttrValue,
}

/// The entry point of an adapter implementation.
pub trait Builder: Send + Sync {
    /// The implementation name configuration refers to.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn default_config(&self) -> Params;

    fn validate_config(&self, params: &Params) -> ConfigErrors;

    fn denials(&self) -> Option<&dyn DenialsBuilder> {
        None
    }

    fn lists(&self) -> Option<&dyn ListsBuilder> {
        None
    }

    fn metrics(&self) -> Option<&dyn MetricsBuilder> {
        None
    }

    /// Reports whether this builder can build aspects of `kind`.
    fn supports(&self, kind: &Kind) -> bool {
        match kind.as_str() {
            "denials" => self.denials().is_some(),
            "lists" => self.lists().is_some(),
            "metrics" => self.metrics().is_some(),
            _ => false,
        }
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub trait DenialsBuilder: Send + Sync {
    fn new_denials_aspect(&self, env: &Env, params: &Params) -> Result<Box<dyn DenialsAspect>>;
}

pub trait ListsBuilder: Send + Sync {
    fn new_lists_aspect(&self, env: &Env, params: &Params) -> Result<Box<dyn ListsAspect>>;
}

pub trait MetricsBuilder: Send + Sync {
    fn new_metrics_aspect(
        &self,
        env: &Env,
        params: &Params,
        metrics: &HashMap<String, Arc<MetricDefinition>>,
    ) -> Result<Box<dyn MetricsAspect>>;
}

/// An inventory of builders, keyed by implementation name.
#[derive(Clone, Default)]
pub struct Registry {
    builders: HashMap<String, Arc<dyn Builder>>,
}

// === impl Env ===

impl Env {
    pub fn new(adapter: &str) -> Self {
        Self {
            span: tracing::info_span!("adapter", name = %adapter),
        }
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

// === impl Registry ===

impl Registry {
    pub fn new(builders: impl IntoIterator<Item = Arc<dyn Builder>>) -> Self {
        let builders = builders
            .into_iter()
            .map(|b| (b.name().to_string(), b))
            .collect();
        Self { builders }
    }

    /// Closes every builder, returning the first failure.
    pub fn close(&self) -> Result<()> {
        let mut first = Ok(());
        for (name, builder) in &self.builders {
            if let Err(error) = builder.close() {
                tracing::warn!(%name, %error, "failed to close builder");
                if first.is_ok() {
                    first = Err(error);
                }
            }
        }
        first
    }
}

impl BuilderFinder for Registry {
    fn find_builder(&self, name: &str) -> Option<Arc<dyn Builder>> {
        self.builders.get(name).cloned()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.builders.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("Registry").field("builders", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl Builder for Nop {
        fn name(&self) -> &str {
            "nop"
        }

        fn description(&self) -> &str {
            "does nothing"
        }

        fn default_config(&self) -> Params {
            Params::Null
        }

        fn validate_config(&self, _: &Params) -> ConfigErrors {
            ConfigErrors::new()
        }

        fn denials(&self) -> Option<&dyn DenialsBuilder> {
            Some(self)
        }
    }

    impl DenialsBuilder for Nop {
        fn new_denials_aspect(&self, _: &Env, _: &Params) -> Result<Box<dyn DenialsAspect>> {
            anyhow::bail!("unimplemented")
        }
    }

    #[test]
    fn capabilities_determine_kinds() {
        let reg = Registry::new([Arc::new(Nop) as Arc<dyn Builder>]);
        let nop = reg.find_builder("nop").expect("builder must be registered");
        assert!(nop.supports(&Kind::DENIALS));
        assert!(!nop.supports(&Kind::METRICS));
        assert!(!nop.supports(&Kind::from("quotas")));
        assert!(reg.find_builder("missing").is_none());
        assert!(reg.close().is_ok());
    }
}
