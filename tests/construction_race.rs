//! Integration tests for racing the first construction of a singleton.
//!
//! Construction sleeps before registering, so every racer arrives while the identity
//! is still being built. None of them may come back empty-handed or with a second
//! instance.

use lazy_singleton_registry::{LookupPath, Registry, RegistryEvent, Singleton};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex, Once};
use std::thread;
use std::time::Duration;

const DELAY: Duration = Duration::from_millis(50);

fn recording_registry() -> (Registry, Arc<Mutex<Vec<RegistryEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let registry = Registry::with_trace_callback(move |event| {
        sink.lock().unwrap().push(event.clone());
    });
    (registry, events)
}

fn race<S: Singleton>(registry: &Registry, racers: usize) -> Vec<Arc<S>> {
    let barrier = Barrier::new(racers);
    thread::scope(|s| {
        let handles: Vec<_> = (0..racers)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry.instance_of::<S>()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .collect()
    })
}

struct SlowLocal {
    id: usize,
}

static SLOW_LOCAL_BUILDS: AtomicUsize = AtomicUsize::new(0);

impl Singleton for SlowLocal {
    fn construct(registry: &Registry) {
        let id = SLOW_LOCAL_BUILDS.fetch_add(1, Ordering::SeqCst);
        thread::sleep(DELAY);
        registry.register(SlowLocal { id });
    }
}

struct SlowHosted;

static SLOW_HOSTED_BUILDS: AtomicUsize = AtomicUsize::new(0);

impl Singleton for SlowHosted {
    fn construct(registry: &Registry) {
        SLOW_HOSTED_BUILDS.fetch_add(1, Ordering::SeqCst);
        thread::sleep(DELAY);
        registry.register(SlowHosted);
    }

    fn host_guard() -> Option<&'static Once> {
        static GUARD: Once = Once::new();
        Some(&GUARD)
    }
}

#[test]
fn test_two_racers_registry_guarded() {
    let (registry, events) = recording_registry();

    let instances = race::<SlowLocal>(&registry, 2);

    assert!(Arc::ptr_eq(&instances[0], &instances[1]));
    assert_eq!(instances[0].id, 0);
    assert_eq!(SLOW_LOCAL_BUILDS.load(Ordering::SeqCst), 1);

    let captured = events.lock().unwrap();
    let constructs = captured
        .iter()
        .filter(|event| matches!(event, RegistryEvent::Construct { .. }))
        .count();
    assert_eq!(constructs, 1);
    assert!(captured
        .iter()
        .all(|event| !matches!(event, RegistryEvent::Lookup { found: false, .. })));
}

#[test]
fn test_many_racers_host_guarded() {
    let (registry, events) = recording_registry();

    let instances = race::<SlowHosted>(&registry, 16);

    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(SLOW_HOSTED_BUILDS.load(Ordering::SeqCst), 1);

    let lookups: Vec<_> = events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            RegistryEvent::Lookup { found, path, .. } => Some((*found, *path)),
            _ => None,
        })
        .collect();
    assert_eq!(lookups.len(), 16);
    assert!(lookups.iter().all(|(found, _)| *found));
}

#[test]
fn test_registration_from_helper_thread_is_visible() {
    struct Handoff(u32);

    impl Singleton for Handoff {
        fn construct(registry: &Registry) {
            // The instance is registered by a different thread than the one constructing.
            thread::scope(|s| {
                s.spawn(|| {
                    thread::sleep(Duration::from_millis(10));
                    registry.register(Handoff(11));
                });
            });
        }
    }

    let registry = Registry::new();
    let instances = race::<Handoff>(&registry, 4);

    assert!(instances.iter().all(|instance| instance.0 == 11));
    assert!(instances.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[test]
fn test_lookup_waits_for_concurrent_registration() {
    // A value registered directly (no construction path) while readers poll for it.
    let (registry, events) = recording_registry();
    let registry = &registry;

    thread::scope(|s| {
        let writer = s.spawn(|| {
            thread::sleep(Duration::from_millis(20));
            registry.register(99u16);
        });

        let reader = s.spawn(|| loop {
            if let Ok(value) = registry.get::<u16>() {
                return value;
            }
            thread::yield_now();
        });

        writer.join().unwrap();
        assert_eq!(*reader.join().unwrap(), 99);
    });

    // Misses were all confirmed under the lock before being reported.
    let captured = events.lock().unwrap();
    assert!(captured.iter().all(|event| match event {
        RegistryEvent::Lookup { found: false, path, .. } => *path == LookupPath::Slow,
        _ => true,
    }));
}
