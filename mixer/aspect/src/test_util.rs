//! Fake adapters and evaluators.

use ahash::AHashMap as HashMap;
use linkerd_mixer_config::{Adapter, Aspect, Combined};
use linkerd_mixer_core::{
    adapter::{
        self, Builder, DenialsAspect, DenialsBuilder, Env, ListsAspect, ListsBuilder,
        MetricValue, MetricsAspect, MetricsBuilder,
    },
    attribute::{Bag, Value},
    descriptor::MetricDefinition,
    expr::{self, Evaluator},
    ConfigErrors, Kind, Params, Status,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

pub(crate) type Record = Arc<dyn Fn(Vec<MetricValue>) -> anyhow::Result<()> + Send + Sync>;

type Make = Box<dyn Fn() -> anyhow::Result<FakeAspect> + Send + Sync>;

/// An aspect of every kind whose behavior is fixed at construction.
#[derive(Clone, Default)]
pub(crate) struct FakeAspect {
    pub(crate) status: Status,
    pub(crate) members: Vec<String>,
    pub(crate) record: Option<Record>,
    pub(crate) closed: Arc<AtomicUsize>,
}

/// Builds [`FakeAspect`]s of the configured kinds, counting how many were
/// built and closed.
pub(crate) struct FakeBuilder {
    name: &'static str,
    kinds: Vec<Kind>,
    make: Make,
    built: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

/// Evaluates expressions with a function.
pub(crate) struct FnEval<F>(pub(crate) F);

// === impl FakeAspect ===

impl adapter::Aspect for FakeAspect {
    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl DenialsAspect for FakeAspect {
    fn deny(&self) -> Status {
        self.status.clone()
    }
}

impl ListsAspect for FakeAspect {
    fn check_list(&self, symbol: &str) -> anyhow::Result<bool> {
        if symbol == "explode" {
            anyhow::bail!("list unavailable");
        }
        Ok(self.members.iter().any(|m| m == symbol))
    }
}

impl MetricsAspect for FakeAspect {
    fn record(&self, values: Vec<MetricValue>) -> anyhow::Result<()> {
        match self.record {
            Some(ref record) => record(values),
            None => Ok(()),
        }
    }
}

// === impl FakeBuilder ===

impl FakeBuilder {
    pub(crate) fn new(
        name: &'static str,
        kinds: Vec<Kind>,
        make: impl Fn() -> anyhow::Result<FakeAspect> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            kinds,
            make: Box::new(make),
            built: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub(crate) fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn build(&self) -> anyhow::Result<FakeAspect> {
        let mut aspect = (self.make)()?;
        aspect.closed = self.closed.clone();
        self.built.fetch_add(1, Ordering::SeqCst);
        Ok(aspect)
    }

    fn capable(&self, kind: Kind) -> bool {
        self.kinds.contains(&kind)
    }
}

impl Builder for FakeBuilder {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "a fake adapter"
    }

    fn default_config(&self) -> Params {
        yaml("{}")
    }

    fn validate_config(&self, _: &Params) -> ConfigErrors {
        ConfigErrors::new()
    }

    fn denials(&self) -> Option<&dyn DenialsBuilder> {
        self.capable(Kind::DENIALS).then_some(self as &dyn DenialsBuilder)
    }

    fn lists(&self) -> Option<&dyn ListsBuilder> {
        self.capable(Kind::LISTS).then_some(self as &dyn ListsBuilder)
    }

    fn metrics(&self) -> Option<&dyn MetricsBuilder> {
        self.capable(Kind::METRICS).then_some(self as &dyn MetricsBuilder)
    }
}

impl DenialsBuilder for FakeBuilder {
    fn new_denials_aspect(
        &self,
        _: &Env,
        _: &Params,
    ) -> anyhow::Result<Box<dyn DenialsAspect>> {
        Ok(Box::new(self.build()?))
    }
}

impl ListsBuilder for FakeBuilder {
    fn new_lists_aspect(&self, _: &Env, _: &Params) -> anyhow::Result<Box<dyn ListsAspect>> {
        Ok(Box::new(self.build()?))
    }
}

impl MetricsBuilder for FakeBuilder {
    fn new_metrics_aspect(
        &self,
        _: &Env,
        _: &Params,
        _: &HashMap<String, Arc<MetricDefinition>>,
    ) -> anyhow::Result<Box<dyn MetricsAspect>> {
        Ok(Box::new(self.build()?))
    }
}

// === impl FnEval ===

impl<F> Evaluator for FnEval<F>
where
    F: Fn(&str) -> Result<Value, expr::Error> + Send + Sync,
{
    fn eval(&self, expr: &str, _: &dyn Bag) -> Result<Value, expr::Error> {
        (self.0)(expr)
    }

    fn eval_string(&self, expr: &str, attrs: &dyn Bag) -> Result<String, expr::Error> {
        self.eval(expr, attrs).map(|v| match v {
            Value::String(s) => s,
            v => v.to_string(),
        })
    }

    fn eval_predicate(&self, expr: &str, attrs: &dyn Bag) -> Result<bool, expr::Error> {
        match self.eval(expr, attrs)? {
            Value::Bool(b) => Ok(b),
            v => Err(expr::Error::Type {
                expr: expr.to_string(),
                expected: "bool",
                found: format!("{:?}", v),
            }),
        }
    }

    fn validate(&self, _: &str) -> Result<(), expr::Error> {
        Ok(())
    }
}

pub(crate) fn yaml(s: &str) -> Params {
    serde_yaml::from_str(s).expect("test params must parse")
}

/// Pairs an aspect of `kind` with an adapter named `adapter`.
pub(crate) fn combined(kind: Kind, adapter: &str, params: &str) -> Combined {
    Combined {
        builder: Arc::new(Adapter {
            name: adapter.to_string(),
            kind: kind.clone(),
            impl_: adapter.to_string(),
            params: yaml("{}"),
        }),
        aspect: Arc::new(Aspect {
            id: 0,
            kind,
            adapter: adapter.to_string(),
            params: yaml(params),
        }),
    }
}
