//! Denies every request with a configured status.

use linkerd_mixer_core::{
    adapter::{Aspect, Builder, DenialsAspect, DenialsBuilder, Env},
    params, Code, ConfigErrors, Params, Status,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenierParams {
    pub code: Code,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct Denier(());

#[derive(Debug)]
struct Denial {
    status: Status,
}

impl Default for DenierParams {
    fn default() -> Self {
        Self {
            code: Code::FailedPrecondition,
            message: "denied by policy".to_string(),
        }
    }
}

// === impl Denier ===

impl Denier {
    pub fn new() -> Self {
        Self(())
    }
}

impl Builder for Denier {
    fn name(&self) -> &str {
        "denier"
    }

    fn description(&self) -> &str {
        "Denies every request with a configured status"
    }

    fn default_config(&self) -> Params {
        params::encode(&DenierParams::default())
    }

    fn validate_config(&self, params: &Params) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        match params::decode::<DenierParams>(params) {
            Ok(DenierParams { code: Code::Ok, .. }) => {
                errors.append("code", "a denier may not return OK");
            }
            Ok(_) => {}
            Err(error) => {
                errors.append("", error);
            }
        }
        errors
    }

    fn denials(&self) -> Option<&dyn DenialsBuilder> {
        Some(self)
    }
}

impl DenialsBuilder for Denier {
    fn new_denials_aspect(
        &self,
        env: &Env,
        params: &Params,
    ) -> anyhow::Result<Box<dyn DenialsAspect>> {
        let DenierParams { code, message } = params::decode(params)?;
        debug!(parent: env.span(), %code, "Created denier");
        Ok(Box::new(Denial {
            status: Status::new(code, message),
        }))
    }
}

// === impl Denial ===

impl Aspect for Denial {
    fn close(self: Box<Self>) -> anyhow::Result<()> {
        Ok(())
    }
}

impl DenialsAspect for Denial {
    fn deny(&self) -> Status {
        self.status.clone()
    }
}
