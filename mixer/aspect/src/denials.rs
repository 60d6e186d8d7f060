use crate::{decode_params, Error, Manager, Method, Output, Wrapper};
use linkerd_mixer_config::Combined;
use linkerd_mixer_core::{
    adapter::{Builder, DenialsAspect, Env},
    attribute::Bag,
    descriptor,
    expr::Evaluator,
    params, AspectValidator, ConfigErrors, Kind, Params,
};
use serde::{Deserialize, Serialize};

/// Denials aspects take no parameters; the adapter decides the status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenialsParams {}

#[derive(Clone, Debug, Default)]
pub struct DenialsManager(());

struct DenialsWrapper {
    aspect: Box<dyn DenialsAspect>,
}

// === impl DenialsManager ===

impl DenialsManager {
    pub fn new() -> Self {
        Self(())
    }
}

impl AspectValidator for DenialsManager {
    fn default_config(&self) -> Params {
        params::encode(&DenialsParams::default())
    }

    fn validate_config(
        &self,
        params: &Params,
        _: &dyn Evaluator,
        _: &descriptor::Finder,
    ) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        if let Err(error) = params::decode::<DenialsParams>(params) {
            errors.append("", error);
        }
        errors
    }
}

impl Manager for DenialsManager {
    fn kind(&self) -> Kind {
        Kind::DENIALS
    }

    fn new_aspect(
        &self,
        combined: &Combined,
        builder: &dyn Builder,
        env: &Env,
        _: &descriptor::Finder,
    ) -> Result<Box<dyn Wrapper>, Error> {
        let DenialsParams {} = decode_params(Kind::DENIALS, &combined.aspect.params)?;
        let denials = builder.denials().ok_or_else(|| Error::BuilderMismatch {
            kind: Kind::DENIALS,
            builder: builder.name().to_string(),
        })?;
        let aspect = denials
            .new_denials_aspect(env, &combined.builder.params)
            .map_err(Error::Adapter)?;
        Ok(Box::new(DenialsWrapper { aspect }))
    }
}

// === impl DenialsWrapper ===

impl Wrapper for DenialsWrapper {
    fn execute(&self, _: &dyn Bag, _: &dyn Evaluator, _: Method) -> Output {
        Output::from(self.aspect.deny())
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.aspect.close()
    }
}
