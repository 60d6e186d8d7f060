#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Turns validated aspect configuration into live, executable aspects.

mod denials;
mod dispatcher;
mod lists;
mod metrics;
mod registry;

#[cfg(test)]
mod test_util;

pub use self::{
    denials::{DenialsManager, DenialsParams},
    dispatcher::Dispatcher,
    lists::{ListsManager, ListsParams},
    metrics::{MetricParams, MetricsManager, MetricsParams},
    registry::Registry,
};

use linkerd_mixer_config::Combined;
use linkerd_mixer_core::{
    adapter::{Builder, Env},
    attribute::Bag,
    descriptor::{self, DefinitionError},
    expr::Evaluator,
    AspectValidator, Kind, KindSet, Status,
};

/// Builds the live aspects of a single kind.
pub trait Manager: AspectValidator {
    fn kind(&self) -> Kind;

    /// Builds a wrapper around an aspect obtained from `builder`.
    ///
    /// `combined` must have been produced by a validator that consulted this
    /// manager, so its params are already merged and validated.
    fn new_aspect(
        &self,
        combined: &Combined,
        builder: &dyn Builder,
        env: &Env,
        descriptors: &descriptor::Finder,
    ) -> Result<Box<dyn Wrapper>, Error>;
}

/// A live aspect. Owns exactly one adapter aspect.
pub trait Wrapper: Send + Sync {
    /// Runs the aspect for a request. Failures are reported through the
    /// output's status.
    fn execute(&self, attrs: &dyn Bag, eval: &dyn Evaluator, method: Method) -> Output;

    /// Closes the adapter aspect.
    fn close(self: Box<Self>) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    pub status: Status,
}

/// The API method on whose behalf aspects are executed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Check,
    Report,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("adapter implementation {builder:?} cannot build {kind} aspects")]
    BuilderMismatch { kind: Kind, builder: String },

    #[error("invalid {kind} params: {source}")]
    Params {
        kind: Kind,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no manager for aspect kind {0}")]
    UnknownKind(Kind),

    #[error("unknown adapter implementation {0:?}")]
    UnknownBuilder(String),

    #[error("unknown metric descriptor {0:?}")]
    UnknownMetric(String),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("failed to construct aspect: {0}")]
    Adapter(#[source] anyhow::Error),
}

// === impl Output ===

impl Output {
    pub fn ok() -> Self {
        Self { status: Status::OK }
    }
}

impl From<Status> for Output {
    fn from(status: Status) -> Self {
        Self { status }
    }
}

// === impl Method ===

impl Method {
    /// The aspect kinds executed for this method.
    pub fn kinds(&self) -> KindSet {
        match self {
            Self::Check => [Kind::DENIALS, Kind::LISTS].into_iter().collect(),
            Self::Report => [Kind::METRICS].into_iter().collect(),
        }
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(
    kind: Kind,
    params: &linkerd_mixer_core::Params,
) -> Result<T, Error> {
    linkerd_mixer_core::params::decode(params).map_err(|source| Error::Params { kind, source })
}
