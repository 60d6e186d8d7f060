#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod manager;
pub mod model;
mod runtime;
mod source;
mod validated;
mod validator;

#[cfg(test)]
mod test_util;

pub use self::{
    manager::{Error, Handle, Manager},
    runtime::{ResolveError, Resolved, Runtime, SelectorError},
    source::{FileSource, Source},
    validated::{Adapter, AdapterKey, Aspect, Combined, Rule, ServiceConfig, Validated},
    validator::{Validator, DEFAULT_ADAPTER},
};

use linkerd_mixer_core::{attribute::Bag, descriptor, KindSet};
use std::sync::Arc;

/// Resolves the aspects that apply to a request.
pub trait Resolve: Send + Sync {
    /// Walks the rule tree, returning the aspects of matching rules whose
    /// kind is in `kinds`, in declaration order.
    fn resolve(&self, attrs: &dyn Bag, kinds: &KindSet) -> Resolved;

    /// The descriptors declared by the configuration being resolved.
    fn descriptors(&self) -> &descriptor::Finder;
}

/// Observes configuration changes.
pub trait ChangeListener: Send + Sync {
    fn config_change(&self, resolver: Arc<dyn Resolve>);
}
