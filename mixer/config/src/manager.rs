use crate::{runtime::Runtime, source::Source, validator::Validator, ChangeListener};
use linkerd_mixer_core::{
    descriptor, expr::Evaluator, AspectValidatorFinder, BuilderFinder, ConfigErrors,
};
use parking_lot::RwLock;
use ring::digest;
use std::{fmt, io, sync::Arc};
use tokio::{task::JoinHandle, time};
use tracing::{debug, info, info_span, warn, Instrument};

/// Keeps the validated configuration current.
///
/// The manager periodically re-reads the global and service configuration
/// sources. When either changed, the configuration is validated and, if
/// valid, a new [`Runtime`] is handed to every registered listener.
pub struct Manager {
    eval: Arc<dyn Evaluator>,
    aspects: Arc<dyn AspectValidatorFinder>,
    builders: Arc<dyn BuilderFinder>,
    global: Box<dyn Source>,
    service: Box<dyn Source>,
    loop_delay: time::Duration,

    listeners: Vec<Arc<dyn ChangeListener>>,
    fingerprints: Option<Fingerprints>,
    descriptors: descriptor::Finder,
    last_error: LastError,
}

/// Controls a running [`Manager`].
pub struct Handle {
    signal: drain::Signal,
    task: JoinHandle<()>,
    last_error: LastError,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {name}: {source}")]
    Source {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigErrors),
}

type LastError = Arc<RwLock<Option<Arc<Error>>>>;

/// Reload periods shorter than this are raised to it.
const MIN_LOOP_DELAY: time::Duration = time::Duration::from_millis(1);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Fingerprint([u8; 32]);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Fingerprints {
    global: Fingerprint,
    service: Fingerprint,
}

// === impl Manager ===

impl Manager {
    pub fn new(
        eval: Arc<dyn Evaluator>,
        aspects: Arc<dyn AspectValidatorFinder>,
        builders: Arc<dyn BuilderFinder>,
        global: impl Source + 'static,
        service: impl Source + 'static,
        loop_delay: time::Duration,
    ) -> Self {
        if loop_delay < MIN_LOOP_DELAY {
            warn!(?loop_delay, min = ?MIN_LOOP_DELAY, "Reload period is too short");
        }
        Self {
            eval,
            aspects,
            builders,
            global: Box::new(global),
            service: Box::new(service),
            loop_delay: loop_delay.max(MIN_LOOP_DELAY),
            listeners: Vec::new(),
            fingerprints: None,
            descriptors: descriptor::Finder::default(),
            last_error: LastError::default(),
        }
    }

    /// Registers a listener. Listeners are notified in registration order.
    pub fn register(&mut self, listener: Arc<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    /// The most recent error encountered while fetching configuration.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.last_error.read().clone()
    }

    /// The descriptors of the most recently accepted configuration.
    pub fn descriptors(&self) -> &descriptor::Finder {
        &self.descriptors
    }

    /// Fetches configuration, returning a new runtime if it changed since the
    /// last successful fetch.
    ///
    /// When validation fails, the manager's state is left as it was.
    pub async fn fetch(&mut self) -> Result<Option<Arc<Runtime>>, Error> {
        let global = read(&*self.global).await?;
        let service = read(&*self.service).await?;
        let fingerprints = Fingerprints {
            global: Fingerprint::of(&global),
            service: Fingerprint::of(&service),
        };
        if self.fingerprints == Some(fingerprints) {
            debug!("Configuration unchanged");
            return Ok(None);
        }

        let mut errors = ConfigErrors::new();
        let global = utf8(self.global.name(), global, &mut errors);
        let service = utf8(self.service.name(), service, &mut errors);
        errors.into_result()?;

        let validated = Validator::new(&*self.aspects, &*self.builders, &*self.eval)
            .validate(&service, &global)?;

        self.descriptors = validated.descriptors().clone();
        self.fingerprints = Some(fingerprints);
        Ok(Some(Arc::new(Runtime::new(
            Arc::new(validated),
            self.eval.clone(),
        ))))
    }

    /// Fetches configuration and notifies listeners if it changed.
    pub async fn fetch_and_notify(&mut self) -> Result<(), Arc<Error>> {
        let rt = match self.fetch().await {
            Ok(Some(rt)) => rt,
            Ok(None) => return Ok(()),
            Err(error) => {
                let error = Arc::new(error);
                *self.last_error.write() = Some(error.clone());
                return Err(error);
            }
        };

        if let Some(Fingerprints { service, .. }) = self.fingerprints {
            info!(source = %self.service.name(), sha = %service, "Installing new config");
        }
        for listener in &self.listeners {
            listener.config_change(rt.clone());
        }
        Ok(())
    }

    /// Loads configuration once and then keeps reloading it in the background.
    ///
    /// A failure of the initial load does not prevent later reloads.
    pub async fn start(mut self) -> Handle {
        if let Err(error) = self.fetch_and_notify().await {
            warn!(%error, "Unable to process config");
        }

        let (signal, watch) = drain::channel();
        let last_error = self.last_error.clone();
        let task = tokio::spawn(self.run(watch).instrument(info_span!("config")));
        Handle {
            signal,
            task,
            last_error,
        }
    }

    async fn run(mut self, watch: drain::Watch) {
        let start = time::Instant::now() + self.loop_delay;
        let mut interval = time::interval_at(start, self.loop_delay);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        let shutdown = watch.signaled();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = self.fetch_and_notify().await {
                        warn!(%error, "Failed to update config");
                    }
                }

                _release = &mut shutdown => {
                    debug!("Stopped");
                    return;
                }
            }
        }
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("global", &self.global.name())
            .field("service", &self.service.name())
            .field("loop_delay", &self.loop_delay)
            .field("listeners", &self.listeners.len())
            .field("fingerprints", &self.fingerprints)
            .finish_non_exhaustive()
    }
}

async fn read(source: &dyn Source) -> Result<Vec<u8>, Error> {
    source.read().await.map_err(|source_error| Error::Source {
        name: source.name().to_string(),
        source: source_error,
    })
}

fn utf8(name: &str, bytes: Vec<u8>, errors: &mut ConfigErrors) -> String {
    String::from_utf8(bytes).unwrap_or_else(|error| {
        errors.append(name, error);
        String::new()
    })
}

// === impl Handle ===

impl Handle {
    /// The most recent error encountered while fetching configuration.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.last_error.read().clone()
    }

    /// Stops the reload task. A fetch that is already in progress completes
    /// before the task stops.
    pub async fn close(self) {
        self.signal.drain().await;
        if let Err(error) = self.task.await {
            warn!(%error, "Config reload task failed");
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("last_error", &self.last_error())
            .finish_non_exhaustive()
    }
}

// === impl Fingerprint ===

impl Fingerprint {
    fn of(bytes: &[u8]) -> Self {
        let digest = digest::digest(&digest::SHA256, bytes);
        let mut fp = [0; 32];
        fp.copy_from_slice(digest.as_ref());
        Self(fp)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
