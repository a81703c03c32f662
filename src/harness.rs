//! Stress driver for hammering a registry from many threads at once.
//!
//! Workers are spawned behind a start gate that opens only after every worker exists,
//! so they all hit the registry together. This maximises contention on the first,
//! constructing lookups.

use std::{
    any::Any,
    env, io,
    str::FromStr,
    sync::{PoisonError, RwLock},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;

pub const THREADS_VAR: &str = "STRESS_THREADS";
pub const ITERATIONS_VAR: &str = "STRESS_ITERATIONS";
pub const WARM_UP_VAR: &str = "STRESS_WARM_UP";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to spawn worker thread")]
    Spawn(#[from] io::Error),

    #[error("worker {thread} panicked: {message}")]
    WorkerPanicked { thread: String, message: String },
}

/// How hard to stress the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressConfig {
    /// Number of concurrent worker threads.
    pub threads: usize,
    /// Calls per worker after its first, initialising call.
    pub iterations: usize,
    /// Run the work once on the calling thread before any worker starts.
    pub warm_up: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 100,
            iterations: 10_000,
            warm_up: false,
        }
    }
}

impl StressConfig {
    /// Reads overrides from `STRESS_THREADS`, `STRESS_ITERATIONS` and `STRESS_WARM_UP`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds a config from `lookup`, falling back to the defaults for unset variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            threads: parse_var(&lookup, THREADS_VAR, defaults.threads)?,
            iterations: parse_var(&lookup, ITERATIONS_VAR, defaults.iterations)?,
            warm_up: parse_var(&lookup, WARM_UP_VAR, defaults.warm_up)?,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

/// Outcome of a completed stress run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub threads: usize,
    /// Calls made by each worker, including the initialising one.
    pub calls_per_thread: usize,
    pub elapsed: Duration,
}

impl StressReport {
    pub fn total_calls(&self) -> usize {
        self.threads * self.calls_per_thread
    }
}

/// Runs `work` on `config.threads` workers, `config.iterations + 1` times each.
///
/// `work` receives the worker index. Workers are named with their index in three-digit
/// hex. Elapsed time covers spawning, the whole run and joining.
///
/// # Errors
///
/// - [`HarnessError::Spawn`] if a worker could not be started. Workers that did start
///   still run to completion before this returns.
/// - [`HarnessError::WorkerPanicked`] for the first worker that panicked.
pub fn run<F>(config: &StressConfig, work: F) -> Result<StressReport, HarnessError>
where
    F: Fn(usize) + Sync,
{
    let started = Instant::now();

    if config.warm_up {
        work(0);
    }

    // Held for writing until every worker is spawned; workers queue up as readers.
    let gate = RwLock::new(());
    let calls_per_thread = config.iterations + 1;

    let outcome = thread::scope(|scope| {
        let closed = gate.write().unwrap_or_else(PoisonError::into_inner);

        let mut workers = Vec::with_capacity(config.threads);
        let mut spawn_error = None;
        for index in 0..config.threads {
            let (gate, work) = (&gate, &work);
            let spawned = thread::Builder::new()
                .name(format!("{index:03X}"))
                .spawn_scoped(scope, move || {
                    drop(gate.read().unwrap_or_else(PoisonError::into_inner));
                    for _ in 0..calls_per_thread {
                        work(index);
                    }
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    spawn_error = Some(err);
                    break;
                }
            }
        }

        tracing::debug!(workers = workers.len(), "opening start gate");
        drop(closed);

        let mut panicked = None;
        for handle in workers {
            let name = handle.thread().name().unwrap_or("unnamed").to_string();
            if let Err(payload) = handle.join() {
                if panicked.is_none() {
                    panicked = Some(HarnessError::WorkerPanicked {
                        thread: name,
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }

        match (spawn_error, panicked) {
            (Some(err), _) => Err(HarnessError::Spawn(err)),
            (None, Some(err)) => Err(err),
            (None, None) => Ok(()),
        }
    });

    outcome?;

    let report = StressReport {
        threads: config.threads,
        calls_per_thread,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        threads = report.threads,
        calls = report.total_calls(),
        elapsed = ?report.elapsed,
        "stress run finished"
    );

    Ok(report)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = StressConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, StressConfig::default());
        assert_eq!(config.threads, 100);
        assert_eq!(config.iterations, 10_000);
        assert!(!config.warm_up);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let lookup = lookup_from(&[(THREADS_VAR, " 8 "), (WARM_UP_VAR, "true")]);
        let config = StressConfig::from_lookup(lookup).unwrap();
        assert_eq!(config.threads, 8);
        assert_eq!(config.iterations, 10_000);
        assert!(config.warm_up);
    }

    #[test]
    fn test_invalid_value_is_reported() {
        let lookup = lookup_from(&[(ITERATIONS_VAR, "lots")]);
        assert_eq!(
            StressConfig::from_lookup(lookup).unwrap_err(),
            ConfigError::Invalid {
                var: ITERATIONS_VAR,
                value: "lots".to_string()
            }
        );
    }

    #[test]
    fn test_every_worker_runs_every_iteration() {
        let config = StressConfig {
            threads: 6,
            iterations: 50,
            warm_up: true,
        };
        let calls = AtomicUsize::new(0);
        let names = Mutex::new(Vec::new());

        let report = run(&config, |index| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                assert_eq!(index, 0);
            }
            let current = thread::current();
            if let Some(name) = current.name() {
                names.lock().unwrap().push(name.to_string());
            }
        })
        .unwrap();

        assert_eq!(report.total_calls(), 6 * 51);
        // Warm-up call on top of the workers' calls.
        assert_eq!(calls.load(Ordering::SeqCst), 6 * 51 + 1);

        let names = names.into_inner().unwrap();
        assert!(names.iter().any(|name| name == "005"));
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let config = StressConfig {
            threads: 3,
            iterations: 0,
            warm_up: false,
        };

        let err = run(&config, |index| {
            if index == 1 {
                panic!("worker gave up");
            }
        })
        .unwrap_err();

        match err {
            HarnessError::WorkerPanicked { thread, message } => {
                assert_eq!(thread, "001");
                assert_eq!(message, "worker gave up");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
