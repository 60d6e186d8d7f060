use crate::model;
use ahash::AHashMap as HashMap;
use linkerd_mixer_core::{descriptor, Kind, Params};
use std::sync::Arc;

/// An immutable, validated configuration snapshot.
#[derive(Debug)]
pub struct Validated {
    pub(crate) adapter_by_name: HashMap<AdapterKey, Arc<Adapter>>,
    pub(crate) service_config: ServiceConfig,
    pub(crate) global_config: model::GlobalConfig,
    pub(crate) descriptors: descriptor::Finder,
    pub(crate) num_aspects: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AdapterKey {
    pub kind: Kind,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    pub subject: String,
    pub revision: String,
    pub rules: Vec<Rule>,
}

/// A node of the rule tree.
#[derive(Clone, Debug, Default)]
pub struct Rule {
    pub selector: Option<String>,
    pub aspects: Vec<Combined>,
    pub rules: Vec<Rule>,
}

/// A configured adapter instance.
#[derive(Clone, Debug, PartialEq)]
pub struct Adapter {
    pub name: String,
    pub kind: Kind,
    pub impl_: String,
    pub params: Params,
}

/// A reference to an aspect from the rule tree, with its parameters merged
/// over the kind's defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct Aspect {
    /// Identifies this aspect within its snapshot.
    pub id: usize,
    pub kind: Kind,
    pub adapter: String,
    pub params: Params,
}

/// An aspect together with the adapter that implements it.
#[derive(Clone, Debug)]
pub struct Combined {
    pub builder: Arc<Adapter>,
    pub aspect: Arc<Aspect>,
}

// === impl Validated ===

impl Validated {
    pub fn adapter(&self, kind: &Kind, name: &str) -> Option<&Arc<Adapter>> {
        self.adapter_by_name.get(&AdapterKey {
            kind: kind.clone(),
            name: name.to_string(),
        })
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.service_config
    }

    pub fn global_config(&self) -> &model::GlobalConfig {
        &self.global_config
    }

    pub fn descriptors(&self) -> &descriptor::Finder {
        &self.descriptors
    }

    /// The number of distinct aspect kinds referenced by the rule tree.
    pub fn num_aspects(&self) -> usize {
        self.num_aspects
    }
}

// === impl Combined ===

impl Combined {
    pub fn kind(&self) -> &Kind {
        &self.aspect.kind
    }
}
