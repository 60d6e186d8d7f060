use crate::{decode_params, Error, Manager, Method, Output, Wrapper};
use linkerd_mixer_config::Combined;
use linkerd_mixer_core::{
    adapter::{Builder, Env, ListsAspect},
    attribute::Bag,
    descriptor,
    expr::Evaluator,
    params, AspectValidator, Code, ConfigErrors, Kind, Params, Status,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListsParams {
    /// Produces the symbol to look up in the list.
    pub check_expression: String,
}

#[derive(Clone, Debug, Default)]
pub struct ListsManager(());

struct ListsWrapper {
    aspect: Box<dyn ListsAspect>,
    check_expression: String,
}

// === impl ListsManager ===

impl ListsManager {
    pub fn new() -> Self {
        Self(())
    }
}

impl AspectValidator for ListsManager {
    fn default_config(&self) -> Params {
        params::encode(&ListsParams::default())
    }

    fn validate_config(
        &self,
        params: &Params,
        eval: &dyn Evaluator,
        _: &descriptor::Finder,
    ) -> ConfigErrors {
        let mut errors = ConfigErrors::new();
        let params = match params::decode::<ListsParams>(params) {
            Ok(params) => params,
            Err(error) => {
                errors.append("", error);
                return errors;
            }
        };

        if params.check_expression.trim().is_empty() {
            errors.append("check_expression", "a check expression is required");
        } else if let Err(error) = eval.validate(&params.check_expression) {
            errors.append("check_expression", error);
        }
        errors
    }
}

impl Manager for ListsManager {
    fn kind(&self) -> Kind {
        Kind::LISTS
    }

    fn new_aspect(
        &self,
        combined: &Combined,
        builder: &dyn Builder,
        env: &Env,
        _: &descriptor::Finder,
    ) -> Result<Box<dyn Wrapper>, Error> {
        let ListsParams { check_expression } =
            decode_params(Kind::LISTS, &combined.aspect.params)?;
        let lists = builder.lists().ok_or_else(|| Error::BuilderMismatch {
            kind: Kind::LISTS,
            builder: builder.name().to_string(),
        })?;
        let aspect = lists
            .new_lists_aspect(env, &combined.builder.params)
            .map_err(Error::Adapter)?;
        Ok(Box::new(ListsWrapper {
            aspect,
            check_expression,
        }))
    }
}

// === impl ListsWrapper ===

impl Wrapper for ListsWrapper {
    fn execute(&self, attrs: &dyn Bag, eval: &dyn Evaluator, _: Method) -> Output {
        let symbol = match eval.eval_string(&self.check_expression, attrs) {
            Ok(symbol) => symbol,
            Err(error) => return Status::internal(error.to_string()).into(),
        };

        match self.aspect.check_list(&symbol) {
            Ok(true) => Output::ok(),
            Ok(false) => {
                debug!(%symbol, "Symbol rejected by list");
                Status::new(Code::NotFound, format!("{:?} is rejected by the list", symbol)).into()
            }
            Err(error) => Status::internal(error.to_string()).into(),
        }
    }

    fn close(self: Box<Self>) -> anyhow::Result<()> {
        self.aspect.close()
    }
}
