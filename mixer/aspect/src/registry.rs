use crate::{DenialsManager, ListsManager, Manager, MetricsManager};
use ahash::AHashMap as HashMap;
use linkerd_mixer_core::{AspectValidator, AspectValidatorFinder, Kind};
use std::{fmt, sync::Arc};

/// The managers available to the runtime, keyed by the kind they manage.
#[derive(Clone, Default)]
pub struct Registry {
    managers: HashMap<Kind, Entry>,
}

#[derive(Clone)]
struct Entry {
    manager: Arc<dyn Manager>,
    validator: Arc<dyn AspectValidator>,
}

// === impl Registry ===

impl Registry {
    /// A registry of the denials, lists and metrics managers.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register(DenialsManager::new());
        registry.register(ListsManager::new());
        registry.register(MetricsManager::new());
        registry
    }

    /// Registers `manager`, replacing any manager of the same kind.
    pub fn register<M: Manager + 'static>(&mut self, manager: M) {
        let manager = Arc::new(manager);
        let entry = Entry {
            manager: manager.clone(),
            validator: manager.clone(),
        };
        self.managers.insert(manager.kind(), entry);
    }

    pub fn find_manager(&self, kind: &Kind) -> Option<&Arc<dyn Manager>> {
        self.managers.get(kind).map(|e| &e.manager)
    }
}

impl AspectValidatorFinder for Registry {
    fn find_aspect_validator(&self, kind: &Kind) -> Option<&dyn AspectValidator> {
        self.managers.get(kind).map(|e| &*e.validator)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds = self.managers.keys().collect::<Vec<_>>();
        kinds.sort();
        f.debug_struct("Registry").field("kinds", &kinds).finish()
    }
}
