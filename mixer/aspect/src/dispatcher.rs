use crate::{Error, Method, Output, Registry, Wrapper};
use ahash::AHashMap as HashMap;
use linkerd_mixer_config::{ChangeListener, Combined, Resolve};
use linkerd_mixer_core::{
    adapter::Env, attribute::Bag, expr::Evaluator, BuilderFinder, Code, Status,
};
use parking_lot::RwLock;
use std::{fmt, sync::Arc};
use tracing::{debug, info, warn};

/// Executes the aspects that apply to each request against the current
/// configuration.
///
/// Each configuration change starts a new generation. Wrappers are built on
/// first use and owned by their generation; a superseded generation closes
/// its wrappers once the last request executing against it completes.
pub struct Dispatcher {
    managers: Arc<Registry>,
    builders: Arc<dyn BuilderFinder>,
    eval: Arc<dyn Evaluator>,
    current: RwLock<Option<Arc<Generation>>>,
}

struct Generation {
    resolver: Arc<dyn Resolve>,
    wrappers: RwLock<HashMap<usize, Box<dyn Wrapper>>>,
}

// === impl Dispatcher ===

impl Dispatcher {
    pub fn new(
        managers: Arc<Registry>,
        builders: Arc<dyn BuilderFinder>,
        eval: Arc<dyn Evaluator>,
    ) -> Self {
        Self {
            managers,
            builders,
            eval,
            current: RwLock::new(None),
        }
    }

    /// Executes every aspect of `method`'s kinds that applies to `attrs`.
    ///
    /// The returned status is the first failing aspect's status. When all
    /// aspects succeed but some selectors could not be evaluated, the status
    /// is `INTERNAL`.
    pub fn execute(&self, attrs: &dyn Bag, method: Method) -> Output {
        let Some(generation) = self.current.read().clone() else {
            return Status::new(Code::Unavailable, "no configuration has been loaded").into();
        };

        let resolved = generation.resolver.resolve(attrs, &method.kinds());
        let mut status = Status::OK;
        for combined in &resolved.combined {
            let out = generation.execute(self, combined, attrs, method);
            if !out.status.is_ok() {
                debug!(
                    aspect = combined.aspect.id,
                    kind = %combined.kind(),
                    adapter = %combined.builder.name,
                    status = %out.status,
                    "Aspect failed"
                );
                if status.is_ok() {
                    status = out.status;
                }
            }
        }

        if let Some(error) = resolved.error {
            warn!(%error, "Failed to resolve aspects");
            if status.is_ok() {
                status = Status::internal(error.to_string());
            }
        }

        Output { status }
    }

    /// Releases the current generation. Its wrappers are closed once no
    /// request is executing against it.
    pub fn close(&self) {
        let prior = self.current.write().take();
        drop(prior);
    }

    fn new_wrapper(
        &self,
        combined: &Combined,
        resolver: &dyn Resolve,
    ) -> Result<Box<dyn Wrapper>, Error> {
        let kind = combined.kind();
        let manager = self
            .managers
            .find_manager(kind)
            .ok_or_else(|| Error::UnknownKind(kind.clone()))?;
        let builder = self
            .builders
            .find_builder(&combined.builder.impl_)
            .ok_or_else(|| Error::UnknownBuilder(combined.builder.impl_.clone()))?;
        let env = Env::new(&combined.builder.name);
        manager.new_aspect(combined, &*builder, &env, resolver.descriptors())
    }
}

impl ChangeListener for Dispatcher {
    fn config_change(&self, resolver: Arc<dyn Resolve>) {
        let generation = Arc::new(Generation {
            resolver,
            wrappers: RwLock::new(HashMap::new()),
        });
        let prior = self.current.write().replace(generation);
        info!(replaced = prior.is_some(), "Adopted configuration");
        drop(prior);
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("managers", &self.managers)
            .field("configured", &self.current.read().is_some())
            .finish_non_exhaustive()
    }
}

// === impl Generation ===

impl Generation {
    fn execute(
        &self,
        dispatcher: &Dispatcher,
        combined: &Combined,
        attrs: &dyn Bag,
        method: Method,
    ) -> Output {
        let id = combined.aspect.id;
        if let Some(wrapper) = self.wrappers.read().get(&id) {
            return wrapper.execute(attrs, &*dispatcher.eval, method);
        }

        let wrapper = match dispatcher.new_wrapper(combined, &*self.resolver) {
            Ok(wrapper) => wrapper,
            Err(error) => {
                warn!(aspect = id, adapter = %combined.builder.name, %error, "Failed to build aspect");
                return Status::internal(error.to_string()).into();
            }
        };
        {
            let mut wrappers = self.wrappers.write();
            if wrappers.contains_key(&id) {
                // Another request built this aspect first.
                drop(wrappers);
                close(id, wrapper);
            } else {
                wrappers.insert(id, wrapper);
            }
        }

        match self.wrappers.read().get(&id) {
            Some(wrapper) => wrapper.execute(attrs, &*dispatcher.eval, method),
            None => Status::internal(format!("aspect {} is unavailable", id)).into(),
        }
    }
}

impl Drop for Generation {
    fn drop(&mut self) {
        let wrappers = std::mem::take(self.wrappers.get_mut());
        debug!(wrappers = wrappers.len(), "Closing superseded aspects");
        for (id, wrapper) in wrappers {
            close(id, wrapper);
        }
    }
}

fn close(id: usize, wrapper: Box<dyn Wrapper>) {
    if let Err(error) = wrapper.close() {
        warn!(aspect = id, %error, "Failed to close aspect");
    }
}
