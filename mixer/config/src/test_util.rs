//! Fake aspect validators and builders.

use ahash::AHashMap as HashMap;
use linkerd_mixer_core::{
    adapter::{self, Builder},
    descriptor,
    expr::Evaluator,
    AspectValidator, AspectValidatorFinder, ConfigErrors, Kind, Params,
};
use std::sync::Arc;

/// Accepts any params without an `invalid` key.
pub(crate) struct FakeValidator;

pub(crate) struct Validators(HashMap<Kind, FakeValidator>);

/// A builder supporting a fixed set of kinds. Params with a `bad` key fail
/// validation.
pub(crate) struct FakeBuilder {
    name: &'static str,
    kinds: Vec<Kind>,
}

impl AspectValidator for FakeValidator {
    fn default_config(&self) -> Params {
        serde_yaml::from_str("{}").unwrap()
    }

    fn validate_config(
        &self,
        params: &Params,
        _: &dyn Evaluator,
        _: &descriptor::Finder,
    ) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if params.get("invalid").is_some() {
            errors.append("invalid", "invalid aspect params");
        }
        errors
    }
}

impl Validators {
    pub(crate) fn new(kinds: impl IntoIterator<Item = Kind>) -> Self {
        Self(kinds.into_iter().map(|k| (k, FakeValidator)).collect())
    }
}

impl AspectValidatorFinder for Validators {
    fn find_aspect_validator(&self, kind: &Kind) -> Option<&dyn AspectValidator> {
        self.0.get(kind).map(|v| v as &dyn AspectValidator)
    }
}

impl Builder for FakeBuilder {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "a fake builder"
    }

    fn default_config(&self) -> Params {
        serde_yaml::from_str("{}").unwrap()
    }

    fn validate_config(&self, params: &Params) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if params.get("bad").is_some() {
            errors.append("bad", "bad builder params");
        }
        errors
    }

    fn supports(&self, kind: &Kind) -> bool {
        self.kinds.contains(kind)
    }
}

pub(crate) fn builders(defs: Vec<(&'static str, Vec<Kind>)>) -> adapter::Registry {
    adapter::Registry::new(
        defs.into_iter()
            .map(|(name, kinds)| Arc::new(FakeBuilder { name, kinds }) as Arc<dyn Builder>),
    )
}
