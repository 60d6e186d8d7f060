use super::*;
use crate::{
    test_util::{builders, Validators},
    Resolve,
};
use linkerd_mixer_core::{attribute::MutableBag, expr::IdentityEvaluator, Kind, KindSet};
use parking_lot::Mutex;

const GLOBAL: &str = r#"
adapters:
  - name: default
    kind: denials
    impl: fake
"#;

const SERVICE: &str = r#"
rules:
  - aspects:
      - kind: denials
"#;

const SERVICE_TWO_RULES: &str = r#"
rules:
  - aspects:
      - kind: denials
  - aspects:
      - kind: denials
"#;

const LOOP_DELAY: time::Duration = time::Duration::from_secs(5);

/// An in-memory source whose contents may be replaced.
#[derive(Clone, Default)]
struct MemSource {
    name: &'static str,
    contents: Arc<Mutex<Option<String>>>,
}

impl MemSource {
    fn new(name: &'static str, contents: &str) -> Self {
        Self {
            name,
            contents: Arc::new(Mutex::new(Some(contents.to_string()))),
        }
    }

    fn set(&self, contents: &str) {
        *self.contents.lock() = Some(contents.to_string());
    }

    fn remove(&self) {
        *self.contents.lock() = None;
    }
}

#[async_trait::async_trait]
impl Source for MemSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn read(&self) -> io::Result<Vec<u8>> {
        self.contents
            .lock()
            .clone()
            .map(String::into_bytes)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such source"))
    }
}

/// Records the resolvers it is handed, tagging each with its id.
#[derive(Clone)]
struct Recorder {
    id: usize,
    log: Arc<Mutex<Vec<(usize, Arc<dyn Resolve>)>>>,
}

impl ChangeListener for Recorder {
    fn config_change(&self, resolver: Arc<dyn Resolve>) {
        self.log.lock().push((self.id, resolver));
    }
}

struct Fixture {
    global: MemSource,
    service: MemSource,
    log: Arc<Mutex<Vec<(usize, Arc<dyn Resolve>)>>>,
}

impl Fixture {
    fn new(listeners: usize) -> (Self, Manager) {
        let global = MemSource::new("global", GLOBAL);
        let service = MemSource::new("service", SERVICE);
        let mut manager = Manager::new(
            Arc::new(IdentityEvaluator::new()),
            Arc::new(Validators::new([Kind::DENIALS])),
            Arc::new(builders(vec![("fake", vec![Kind::DENIALS])])),
            global.clone(),
            service.clone(),
            LOOP_DELAY,
        );

        let log = Arc::new(Mutex::new(Vec::new()));
        for id in 0..listeners {
            manager.register(Arc::new(Recorder {
                id,
                log: log.clone(),
            }));
        }

        let fixture = Self {
            global,
            service,
            log,
        };
        (fixture, manager)
    }

    fn notifications(&self) -> Vec<usize> {
        self.log.lock().iter().map(|(id, _)| *id).collect()
    }

    fn latest_resolution_len(&self) -> usize {
        let log = self.log.lock();
        let (_, resolver) = log.last().expect("a config must have been installed");
        let kinds = [Kind::DENIALS].into_iter().collect::<KindSet>();
        resolver
            .resolve(&MutableBag::default(), &kinds)
            .combined
            .len()
    }
}

#[tokio::test]
async fn fetch_detects_changes() {
    let (fixture, mut manager) = Fixture::new(0);

    let rt = manager.fetch().await.expect("must fetch");
    let rt = rt.expect("initial fetch must produce a runtime");
    assert_eq!(rt.validated().num_aspects(), 1);

    assert!(
        manager.fetch().await.expect("must fetch").is_none(),
        "unchanged configuration must not produce a runtime"
    );

    fixture.service.set(SERVICE_TWO_RULES);
    assert!(
        manager.fetch().await.expect("must fetch").is_some(),
        "a service change alone must produce a runtime"
    );
    assert!(manager.fetch().await.expect("must fetch").is_none());

    fixture.global.set(&format!("{}\nmetrics: []\n", GLOBAL));
    assert!(
        manager.fetch().await.expect("must fetch").is_some(),
        "a global change alone must produce a runtime"
    );
}

#[tokio::test]
async fn unchanged_config_does_not_notify() {
    let (fixture, mut manager) = Fixture::new(1);

    manager.fetch_and_notify().await.expect("must fetch");
    manager.fetch_and_notify().await.expect("must fetch");
    assert_eq!(fixture.notifications(), vec![0]);
    assert_eq!(fixture.latest_resolution_len(), 1);

    fixture.service.set(SERVICE_TWO_RULES);
    manager.fetch_and_notify().await.expect("must fetch");
    assert_eq!(fixture.notifications(), vec![0, 0]);
    assert_eq!(fixture.latest_resolution_len(), 2);
    assert!(manager.last_error().is_none());
}

#[tokio::test]
async fn listeners_notified_in_registration_order() {
    let (fixture, mut manager) = Fixture::new(3);
    manager.fetch_and_notify().await.expect("must fetch");
    assert_eq!(fixture.notifications(), vec![0, 1, 2]);
}

#[tokio::test]
async fn invalid_config_keeps_current_state() {
    let (fixture, mut manager) = Fixture::new(1);
    manager.fetch_and_notify().await.expect("must fetch");

    fixture.service.set("rules:\n  - aspects:\n      - kind: quotas\n");
    let error = manager
        .fetch_and_notify()
        .await
        .expect_err("unknown kinds must fail validation");
    assert!(matches!(*error, Error::Invalid(_)), "{}", error);
    assert_eq!(fixture.notifications(), vec![0]);
    let last = manager.last_error().expect("error must be recorded");
    assert!(Arc::ptr_eq(&last, &error));

    // The same invalid content is validated again on the next fetch.
    assert!(manager.fetch().await.is_err());

    // Reverting to the accepted content is not a change.
    fixture.service.set(SERVICE);
    assert!(manager.fetch().await.expect("must fetch").is_none());

    fixture.service.set(SERVICE_TWO_RULES);
    manager.fetch_and_notify().await.expect("must fetch");
    assert_eq!(fixture.notifications(), vec![0, 0]);
    assert_eq!(fixture.latest_resolution_len(), 2);
}

#[tokio::test]
async fn source_errors_are_recorded() {
    let (fixture, mut manager) = Fixture::new(1);
    fixture.global.remove();

    let error = manager.fetch_and_notify().await.expect_err("must fail");
    match &*error {
        Error::Source { name, source } => {
            assert_eq!(name, "global");
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        error => panic!("unexpected error: {}", error),
    }
    assert!(manager.last_error().is_some());
    assert!(fixture.notifications().is_empty());
}

#[tokio::test]
async fn non_utf8_config_is_invalid() {
    struct Bytes;

    #[async_trait::async_trait]
    impl Source for Bytes {
        fn name(&self) -> &str {
            "bytes"
        }

        async fn read(&self) -> io::Result<Vec<u8>> {
            Ok(vec![0xff, 0xfe])
        }
    }

    let (_fixture, mut manager) = Fixture::new(0);
    manager.service = Box::new(Bytes);
    match manager.fetch().await.expect_err("must fail") {
        Error::Invalid(errors) => {
            let fields = errors.iter().map(|e| e.field.as_str()).collect::<Vec<_>>();
            assert_eq!(fields, vec!["bytes"]);
        }
        error => panic!("unexpected error: {}", error),
    }
}

#[tokio::test(start_paused = true)]
async fn reloads_periodically_until_closed() {
    let _trace = tracing_subscriber::fmt().with_test_writer().try_init();

    let (fixture, manager) = Fixture::new(1);
    fixture.service.remove();

    let handle = manager.start().await;
    assert!(
        handle.last_error().is_some(),
        "the initial load must have failed"
    );
    assert!(fixture.notifications().is_empty());

    fixture.service.set(SERVICE);
    time::sleep(LOOP_DELAY + time::Duration::from_millis(1)).await;
    assert_eq!(fixture.notifications(), vec![0]);

    // Nothing changes across several periods.
    time::sleep(LOOP_DELAY * 3).await;
    assert_eq!(fixture.notifications(), vec![0]);

    fixture.service.set(SERVICE_TWO_RULES);
    time::sleep(LOOP_DELAY).await;
    assert_eq!(fixture.notifications(), vec![0, 0]);

    handle.close().await;
    fixture.service.set(SERVICE);
    time::sleep(LOOP_DELAY * 2).await;
    assert_eq!(fixture.notifications(), vec![0, 0]);
}

#[tokio::test(start_paused = true)]
async fn zero_loop_delay_keeps_reloading() {
    let global = MemSource::new("global", GLOBAL);
    let service = MemSource::new("service", SERVICE);
    let mut manager = Manager::new(
        Arc::new(IdentityEvaluator::new()),
        Arc::new(Validators::new([Kind::DENIALS])),
        Arc::new(builders(vec![("fake", vec![Kind::DENIALS])])),
        global,
        service.clone(),
        time::Duration::ZERO,
    );
    let log = Arc::new(Mutex::new(Vec::new()));
    manager.register(Arc::new(Recorder {
        id: 0,
        log: log.clone(),
    }));

    let handle = manager.start().await;
    assert_eq!(log.lock().len(), 1);

    service.set(SERVICE_TWO_RULES);
    time::sleep(time::Duration::from_secs(1)).await;
    assert!(!handle.task.is_finished(), "reload task must keep running");
    assert_eq!(log.lock().len(), 2);

    handle.close().await;
}

#[tokio::test]
async fn start_loads_synchronously() {
    let (fixture, manager) = Fixture::new(2);
    let handle = manager.start().await;
    assert_eq!(fixture.notifications(), vec![0, 1]);
    assert!(handle.last_error().is_none());
    handle.close().await;
}
