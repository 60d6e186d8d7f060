use crate::{
    validated::{Combined, Rule, Validated},
    Resolve,
};
use linkerd_mixer_core::{attribute::Bag, descriptor, expr, KindSet};
use std::{fmt, sync::Arc};
use tracing::trace;

/// A point-in-time view of configuration, able to resolve the aspects that
/// apply to a request.
///
/// A runtime never changes once built. Configuration changes produce a new
/// runtime; requests that began against an older one finish against it.
#[derive(Clone)]
pub struct Runtime {
    validated: Arc<Validated>,
    eval: Arc<dyn expr::Evaluator>,
}

/// The aspects that apply to a request.
///
/// When some selectors could not be evaluated, `combined` still holds every
/// aspect from the branches that could be, and `error` lists the failures.
#[derive(Debug, Default)]
pub struct Resolved {
    pub combined: Vec<Combined>,
    pub error: Option<ResolveError>,
}

/// Selector evaluation failures collected during a single resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveError {
    errors: Vec<SelectorError>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("selector {selector:?}: {error}")]
pub struct SelectorError {
    pub selector: String,
    #[source]
    pub error: expr::Error,
}

// === impl Runtime ===

impl Runtime {
    pub fn new(validated: Arc<Validated>, eval: Arc<dyn expr::Evaluator>) -> Self {
        Self { validated, eval }
    }

    pub fn validated(&self) -> &Arc<Validated> {
        &self.validated
    }

    pub fn evaluator(&self) -> &Arc<dyn expr::Evaluator> {
        &self.eval
    }

    fn resolve_rules(
        &self,
        rules: &[Rule],
        attrs: &dyn Bag,
        kinds: &KindSet,
        combined: &mut Vec<Combined>,
        errors: &mut Vec<SelectorError>,
    ) {
        for rule in rules {
            let matched = match rule.selector.as_deref() {
                None => true,
                Some(selector) => match self.eval.eval_predicate(selector, attrs) {
                    Ok(matched) => matched,
                    Err(error) => {
                        trace!(%selector, %error, "Selector failed");
                        errors.push(SelectorError {
                            selector: selector.to_string(),
                            error,
                        });
                        continue;
                    }
                },
            };
            trace!(selector = ?rule.selector, matched);
            if !matched {
                continue;
            }

            combined.extend(
                rule.aspects
                    .iter()
                    .filter(|c| kinds.contains(c.kind()))
                    .cloned(),
            );
            self.resolve_rules(&rule.rules, attrs, kinds, combined, errors);
        }
    }
}

impl Resolve for Runtime {
    fn resolve(&self, attrs: &dyn Bag, kinds: &KindSet) -> Resolved {
        let mut combined = Vec::with_capacity(self.validated.num_aspects());
        let mut errors = Vec::new();
        self.resolve_rules(
            &self.validated.service_config().rules,
            attrs,
            kinds,
            &mut combined,
            &mut errors,
        );

        Resolved {
            combined,
            error: (!errors.is_empty()).then_some(ResolveError { errors }),
        }
    }

    fn descriptors(&self) -> &descriptor::Finder {
        self.validated.descriptors()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("validated", &self.validated)
            .finish_non_exhaustive()
    }
}

// === impl Resolved ===

impl Resolved {
    /// Discards partial results when any selector failed.
    pub fn into_result(self) -> Result<Vec<Combined>, ResolveError> {
        match self.error {
            None => Ok(self.combined),
            Some(error) => Err(error),
        }
    }
}

// === impl ResolveError ===

impl ResolveError {
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SelectorError> {
        self.errors.iter()
    }

    pub fn into_inner(self) -> Vec<SelectorError> {
        self.errors
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} selector(s) failed to evaluate", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            fmt::Display::fmt(e, f)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResolveError {}

impl<'a> IntoIterator for &'a ResolveError {
    type Item = &'a SelectorError;
    type IntoIter = std::slice::Iter<'a, SelectorError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
