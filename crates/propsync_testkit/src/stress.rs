//! Stress tests for PropSync.
//!
//! These helpers drive stores and scopes under heavy load and concurrent
//! access.

use propsync_codec::{Payload, Value};
use propsync_core::{Reader, Scope, Store};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct input fields.
    pub fields: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            fields: 16,
        }
    }
}

impl StressConfig {
    /// A configuration small enough for unit tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            operations: 200,
            threads: 4,
            fields: 8,
        }
    }
}

/// Builds the inputs of cycle `i`: `fields` fields, one of which changes.
pub fn cycle_inputs(i: usize, fields: usize) -> Payload {
    let fields = fields.max(1);
    (0..fields)
        .map(|f| {
            let value = if f == i % fields { i as i64 } else { 0 };
            (format!("field_{f}"), Value::Integer(value))
        })
        .collect()
}

/// Runs sequential cycles with inputs that change every time.
///
/// An operation succeeds when its cycle merged.
pub fn stress_changing_cycles(scope: &Scope, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 1..=config.operations {
        if scope.evaluate(&cycle_inputs(i, config.fields)).direct_merged {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Runs sequential cycles with identical inputs.
///
/// An operation succeeds when its cycle was skipped; only the first cycle
/// is expected to merge.
pub fn stress_identical_cycles(scope: &Scope, config: &StressConfig) -> StressTestResult {
    let inputs = cycle_inputs(0, config.fields);
    scope.evaluate(&inputs);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for _ in 0..config.operations {
        if scope.evaluate(&inputs).merged() {
            failed += 1;
        } else {
            successful += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Merges from several threads at once, each into its own field.
///
/// Every thread's last write must be visible afterwards.
pub fn stress_concurrent_merges(store: &Store, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();

    thread::scope(|s| {
        for t in 0..config.threads {
            s.spawn(move || {
                for i in 0..config.operations {
                    store.merge(&Payload::new().with(format!("thread_{t}"), i as i64));
                }
            });
        }
    });

    let state = store.get_state();
    let last = config.operations.saturating_sub(1) as i64;
    let successful = (0..config.threads)
        .filter(|t| state.get(&format!("thread_{t}")) == Some(&Value::Integer(last)))
        .count();

    StressTestResult::new(
        successful * config.operations,
        (config.threads - successful) * config.operations,
        start.elapsed(),
    )
}

/// Reads through a reader from several threads while the scope keeps
/// evaluating on the calling thread.
pub fn stress_concurrent_reads(
    scope: &Scope,
    reader: &Reader,
    config: &StressConfig,
) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|s| {
        for _ in 0..config.threads {
            s.spawn(|| {
                for _ in 0..config.operations {
                    match scope.enter(|| reader.get()) {
                        Ok(_) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }

        for i in 1..=config.operations {
            scope.evaluate(&cycle_inputs(i, config.fields));
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}
