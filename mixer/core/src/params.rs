//! Opaque, kind-specific parameter objects.
//!
//! Parameters are carried through configuration as YAML values. Each manager
//! and builder publishes a default shape, user-supplied values are merged over
//! it, and the owner decodes the result into its own typed representation.

use serde::{de::DeserializeOwned, Serialize};

pub type Params = serde_yaml::Value;

/// Encodes a typed parameter object.
pub fn encode<T: Serialize>(params: &T) -> Params {
    serde_yaml::to_value(params).unwrap_or(Params::Null)
}

/// Decodes parameters into their typed representation.
pub fn decode<T: DeserializeOwned>(params: &Params) -> Result<T, serde_yaml::Error> {
    serde_yaml::from_value(params.clone())
}

/// Merges `overrides` over `defaults`.
///
/// Mappings are merged key-by-key, recursively. Any other non-null override
/// replaces the default outright.
pub fn merge(defaults: Params, overrides: Params) -> Params {
    match (defaults, overrides) {
        (Params::Mapping(mut base), Params::Mapping(over)) => {
            for (k, v) in over {
                let merged = match base.remove(&k) {
                    Some(b) => merge(b, v),
                    None => v,
                };
                base.insert(k, merged);
            }
            Params::Mapping(base)
        }
        (defaults, Params::Null) => defaults,
        (_, overrides) => overrides,
    }
}
