//! The configuration documents as written by operators.

use linkerd_mixer_core::{descriptor::MetricDescriptor, Params};
use serde::{Deserialize, Serialize};

/// Declares the adapters and descriptors available to every service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub adapters: Vec<Adapter>,
    pub metrics: Vec<MetricDescriptor>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Adapter {
    pub name: String,
    pub kind: String,
    #[serde(rename = "impl")]
    pub impl_: String,
    pub params: Params,
}

/// Declares the rule tree for a service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub subject: String,
    pub revision: String,
    pub rules: Vec<AspectRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AspectRule {
    /// A predicate over request attributes. An empty selector always matches.
    pub selector: String,
    pub aspects: Vec<Aspect>,
    pub rules: Vec<AspectRule>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Aspect {
    pub kind: String,
    /// Names an adapter of the same kind. When empty, the kind's default
    /// adapter is used.
    pub adapter: String,
    pub params: Params,
}
