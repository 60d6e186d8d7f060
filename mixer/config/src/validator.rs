use crate::{
    model,
    validated::{Adapter, AdapterKey, Aspect, Combined, Rule, ServiceConfig, Validated},
};
use ahash::AHashMap as HashMap;
use linkerd_mixer_core::{
    descriptor, expr::Evaluator, params, AspectValidatorFinder, BuilderFinder, ConfigErrors,
    Kind, KindSet,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// The name of the adapter used by aspects that do not name one.
pub const DEFAULT_ADAPTER: &str = "default";

/// Compiles configuration documents into a [`Validated`] snapshot.
pub struct Validator<'a> {
    aspects: &'a dyn AspectValidatorFinder,
    builders: &'a dyn BuilderFinder,
    eval: &'a dyn Evaluator,
}

/// Accumulates state while the rule tree is compiled.
struct Rules<'a> {
    adapters: &'a HashMap<AdapterKey, Arc<Adapter>>,
    first_by_kind: &'a HashMap<Kind, Arc<Adapter>>,
    descriptors: &'a descriptor::Finder,
    kinds: KindSet,
    next_id: usize,
    errors: ConfigErrors,
}

// === impl Validator ===

impl<'a> Validator<'a> {
    pub fn new(
        aspects: &'a dyn AspectValidatorFinder,
        builders: &'a dyn BuilderFinder,
        eval: &'a dyn Evaluator,
    ) -> Self {
        Self {
            aspects,
            builders,
            eval,
        }
    }

    /// Validates the service and global configuration documents.
    ///
    /// Every problem found in either document is reported.
    pub fn validate(&self, service: &str, global: &str) -> Result<Validated, ConfigErrors> {
        let mut errors = ConfigErrors::new();
        let global_config = parse::<model::GlobalConfig>("global", global, &mut errors);
        let service_config = parse::<model::ServiceConfig>("service", service, &mut errors);
        let (Some(global_config), Some(service_config)) = (global_config, service_config) else {
            return Err(errors);
        };

        let (descriptors, errs) = descriptor::Finder::new(&global_config.metrics);
        errors.extend("global", errs);

        let (adapter_by_name, first_by_kind) = self.adapters(&global_config, &mut errors);

        let mut rules = Rules {
            adapters: &adapter_by_name,
            first_by_kind: &first_by_kind,
            descriptors: &descriptors,
            kinds: KindSet::default(),
            next_id: 0,
            errors,
        };
        let compiled = self.rules("service.rules", &service_config.rules, &mut rules);
        let Rules {
            kinds,
            next_id,
            errors,
            ..
        } = rules;
        errors.into_result()?;

        debug!(
            adapters = adapter_by_name.len(),
            aspects = next_id,
            kinds = kinds.len(),
            "Validated configuration"
        );
        Ok(Validated {
            adapter_by_name,
            service_config: ServiceConfig {
                subject: service_config.subject,
                revision: service_config.revision,
                rules: compiled,
            },
            global_config,
            descriptors,
            num_aspects: kinds.len(),
        })
    }

    fn adapters(
        &self,
        global: &model::GlobalConfig,
        errors: &mut ConfigErrors,
    ) -> (
        HashMap<AdapterKey, Arc<Adapter>>,
        HashMap<Kind, Arc<Adapter>>,
    ) {
        let mut by_name = HashMap::with_capacity(global.adapters.len());
        let mut first_by_kind = HashMap::new();

        for (i, adapter) in global.adapters.iter().enumerate() {
            let field = format!("global.adapters[{}]", i);
            if adapter.name.is_empty() {
                errors.append(format!("{}.name", field), "adapters must be named");
                continue;
            }

            let kind = Kind::from(adapter.kind.as_str());
            if self.aspects.find_aspect_validator(&kind).is_none() {
                errors.append(
                    format!("{}.kind", field),
                    format!("unknown aspect kind {:?}", adapter.kind),
                );
                continue;
            }

            let Some(builder) = self.builders.find_builder(&adapter.impl_) else {
                errors.append(
                    format!("{}.impl", field),
                    format!("unknown adapter implementation {:?}", adapter.impl_),
                );
                continue;
            };
            if !builder.supports(&kind) {
                errors.append(
                    format!("{}.impl", field),
                    format!(
                        "adapter implementation {:?} does not support aspect kind {}",
                        adapter.impl_, kind
                    ),
                );
                continue;
            }

            let params = params::merge(builder.default_config(), adapter.params.clone());
            errors.extend(
                &format!("{}.params", field),
                builder.validate_config(&params),
            );

            let key = AdapterKey {
                kind: kind.clone(),
                name: adapter.name.clone(),
            };
            if by_name.contains_key(&key) {
                errors.append(
                    format!("{}.name", field),
                    format!("duplicate adapter {:?} for aspect kind {}", adapter.name, kind),
                );
                continue;
            }

            let adapter = Arc::new(Adapter {
                name: adapter.name.clone(),
                kind: kind.clone(),
                impl_: adapter.impl_.clone(),
                params,
            });
            first_by_kind
                .entry(kind)
                .or_insert_with(|| adapter.clone());
            by_name.insert(key, adapter);
        }

        (by_name, first_by_kind)
    }

    fn rules(&self, path: &str, rules: &[model::AspectRule], state: &mut Rules<'_>) -> Vec<Rule> {
        rules
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let path = format!("{}[{}]", path, i);

                let selector = rule.selector.trim();
                let selector = if selector.is_empty() {
                    None
                } else {
                    if let Err(error) = self.eval.validate(selector) {
                        state.errors.append(format!("{}.selector", path), error);
                    }
                    Some(selector.to_string())
                };

                let aspects = rule
                    .aspects
                    .iter()
                    .enumerate()
                    .filter_map(|(j, aspect)| {
                        self.aspect(&format!("{}.aspects[{}]", path, j), aspect, state)
                    })
                    .collect();

                let rules = self.rules(&format!("{}.rules", path), &rule.rules, state);

                Rule {
                    selector,
                    aspects,
                    rules,
                }
            })
            .collect()
    }

    fn aspect(&self, field: &str, aspect: &model::Aspect, state: &mut Rules<'_>) -> Option<Combined> {
        let kind = Kind::from(aspect.kind.as_str());
        let Some(validator) = self.aspects.find_aspect_validator(&kind) else {
            state.errors.append(
                format!("{}.kind", field),
                format!("unknown aspect kind {:?}", aspect.kind),
            );
            return None;
        };

        let params = params::merge(validator.default_config(), aspect.params.clone());
        state.errors.extend(
            &format!("{}.params", field),
            validator.validate_config(&params, self.eval, state.descriptors),
        );

        let builder = if aspect.adapter.is_empty() {
            state
                .adapters
                .get(&AdapterKey {
                    kind: kind.clone(),
                    name: DEFAULT_ADAPTER.to_string(),
                })
                .or_else(|| state.first_by_kind.get(&kind))
        } else {
            state.adapters.get(&AdapterKey {
                kind: kind.clone(),
                name: aspect.adapter.clone(),
            })
        };
        let Some(builder) = builder.cloned() else {
            let msg = if aspect.adapter.is_empty() {
                format!("no adapter is configured for aspect kind {}", kind)
            } else {
                format!("unknown adapter {:?} for aspect kind {}", aspect.adapter, kind)
            };
            state.errors.append(format!("{}.adapter", field), msg);
            return None;
        };

        state.kinds.insert(kind.clone());
        let id = state.next_id;
        state.next_id += 1;
        Some(Combined {
            aspect: Arc::new(Aspect {
                id,
                kind,
                adapter: builder.name.clone(),
                params,
            }),
            builder,
        })
    }
}

fn parse<T>(field: &str, doc: &str, errors: &mut ConfigErrors) -> Option<T>
where
    T: DeserializeOwned + Default,
{
    if doc.trim().is_empty() {
        return Some(T::default());
    }
    match serde_yaml::from_str(doc) {
        Ok(cfg) => Some(cfg),
        Err(error) => {
            errors.append(field, error);
            None
        }
    }
}
