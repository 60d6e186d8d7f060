use crate::{adapter::Builder, descriptor, expr::Evaluator, ConfigErrors, Kind, Params};
use std::sync::Arc;

/// Validates the parameters of one aspect kind.
pub trait AspectValidator: Send + Sync {
    /// The zero-value parameter shape for the kind.
    fn default_config(&self) -> Params;

    /// Returns every problem found in `params`; an empty result means the
    /// parameters are valid.
    fn validate_config(
        &self,
        params: &Params,
        eval: &dyn Evaluator,
        descriptors: &descriptor::Finder,
    ) -> ConfigErrors;
}

/// Resolves an aspect kind to the validator for its parameters.
pub trait AspectValidatorFinder: Send + Sync {
    fn find_aspect_validator(&self, kind: &Kind) -> Option<&dyn AspectValidator>;
}

/// Resolves a builder implementation name to the builder.
pub trait BuilderFinder: Send + Sync {
    fn find_builder(&self, name: &str) -> Option<Arc<dyn Builder>>;
}
