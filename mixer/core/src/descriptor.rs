//! Metric descriptors declared in the global configuration.

use crate::ConfigErrors;
use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Unspecified,
    Counter,
    Gauge,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Unspecified,
    String,
    Int64,
    Double,
    Bool,
}

/// A metric as declared in configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricDescriptor {
    pub name: String,
    pub kind: MetricKind,
    pub value: ValueType,
    pub description: String,
    pub labels: BTreeMap<String, ValueType>,
}

/// A metric as presented to adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    pub value: ValueType,
    pub description: String,
    pub labels: BTreeMap<String, ValueType>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("metric {0:?} has kind UNSPECIFIED")]
    KindUnspecified(String),

    #[error("metric {0:?} has value type UNSPECIFIED")]
    ValueUnspecified(String),

    #[error("metric {metric:?} label {label:?} has value type UNSPECIFIED")]
    LabelUnspecified { metric: String, label: String },
}

/// Looks up descriptors by name.
#[derive(Clone, Debug, Default)]
pub struct Finder {
    metrics: Arc<HashMap<String, MetricDescriptor>>,
}

// === impl MetricDefinition ===

impl TryFrom<&MetricDescriptor> for MetricDefinition {
    type Error = DefinitionError;

    fn try_from(desc: &MetricDescriptor) -> Result<Self, Self::Error> {
        if desc.kind == MetricKind::Unspecified {
            return Err(DefinitionError::KindUnspecified(desc.name.clone()));
        }
        if desc.value == ValueType::Unspecified {
            return Err(DefinitionError::ValueUnspecified(desc.name.clone()));
        }
        if let Some((label, _)) = desc
            .labels
            .iter()
            .find(|(_, t)| **t == ValueType::Unspecified)
        {
            return Err(DefinitionError::LabelUnspecified {
                metric: desc.name.clone(),
                label: label.clone(),
            });
        }

        Ok(Self {
            name: desc.name.clone(),
            kind: desc.kind,
            value: desc.value,
            description: desc.description.clone(),
            labels: desc.labels.clone(),
        })
    }
}

// === impl Finder ===

impl Finder {
    /// Indexes `metrics`, reporting duplicate and malformed descriptors.
    pub fn new(metrics: &[MetricDescriptor]) -> (Self, ConfigErrors) {
        let mut errors = ConfigErrors::new();
        let mut index = HashMap::with_capacity(metrics.len());
        for (i, desc) in metrics.iter().enumerate() {
            let field = format!("metrics[{}]", i);
            if desc.name.is_empty() {
                errors.append(field, "metric descriptors must be named");
                continue;
            }
            if let Err(error) = MetricDefinition::try_from(desc) {
                errors.append(field.clone(), error);
            }
            if index.insert(desc.name.clone(), desc.clone()).is_some() {
                errors.append(field, format!("duplicate metric descriptor {:?}", desc.name));
            }
        }

        let finder = Self {
            metrics: Arc::new(index),
        };
        (finder, errors)
    }

    pub fn get_metric(&self, name: &str) -> Option<&MetricDescriptor> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
