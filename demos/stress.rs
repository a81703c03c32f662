//! Stress run: many threads resolving eleven singletons over and over.
//!
//! Demonstrates:
//! - Lazy, exactly-once construction racing across all workers at start-up
//! - Lock-free lookups once every singleton is present
//! - Mixing registry-guarded and host-guarded singletons
//!
//! Run with: `cargo run --release --example stress`
//! Tune with `STRESS_THREADS`, `STRESS_ITERATIONS`, `STRESS_WARM_UP`, and
//! `RUST_LOG=lazy_singleton_registry=debug` for construction logs.

use std::process::ExitCode;

use lazy_singleton_registry::{
    define_singleton,
    harness::{self, StressConfig},
    Payload, Registry, RegistryError,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

define_singleton!(Singleton0);
define_singleton!(Singleton1);
define_singleton!(Singleton2);
define_singleton!(Singleton3);
define_singleton!(Singleton4);
define_singleton!(Singleton5, host_guarded);
define_singleton!(Singleton6);
define_singleton!(Singleton7);
define_singleton!(Singleton8, host_guarded);
define_singleton!(Singleton9);
define_singleton!(Singleton10);

fn init_tracing() {
    // Only initialize if RUST_LOG is set
    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_names(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn call_singletons(registry: &Registry) -> Result<(), RegistryError> {
    registry.instance_of::<Singleton0>()?.run_with_default(|x: f64| x.exp());
    registry.instance_of::<Singleton1>()?.run_with_default(|x: f64| x.exp().sqrt());
    registry.instance_of::<Singleton2>()?.run_with_default(|x: f64| x.sin() * x.sin() + x.cos() * x.cos());
    registry.instance_of::<Singleton3>()?.run_with_default(|x: f64| (x * x).sin() + (x * x).cos());
    registry.instance_of::<Singleton4>()?.run_with_default(|x: f64| x.signum() * x.cos() + x.sin().abs());
    registry.instance_of::<Singleton5>()?.run_with_default(|x: u64| x.count_ones());
    registry.instance_of::<Singleton8>()?.run_with_default(|x: f64| x.ln());
    registry.instance_of::<Singleton6>()?.run_with_default(|x: i32| x.abs());
    registry.instance_of::<Singleton7>()?.run_with_default(|x: i32| f64::from(x).powi(x));
    registry.instance_of::<Singleton9>()?.run_with_default(|x: i32| x.to_string().len());
    registry.instance_of::<Singleton10>()?.run_with_default(|x: bool| !x);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    let config = match StressConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let registry = Registry::new();
    let outcome = harness::run(&config, |_| {
        if let Err(err) = call_singletons(&registry) {
            panic!("{err}");
        }
    });

    match outcome {
        Ok(report) => {
            println!("Done.");
            println!("singletons: {}", registry.len());
            println!("calls: {}", report.total_calls());
            println!("time: {}", report.elapsed.as_millis());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
