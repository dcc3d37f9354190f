// Centralized observability infrastructure: structured logging, a small
// trace-context type, and a perf timer, mirroring the shape used throughout
// the rest of this crate's call stack.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize logging with the crate's default verbosity (warnings and
/// errors for this crate, errors only for dependencies).
pub fn init_logging() -> Result<()> {
    init_logging_with_level(false, false)
}

/// Initialize logging with configurable verbosity. `quiet` always wins over
/// both `verbose` and `RUST_LOG`.
pub fn init_logging_with_level(verbose: bool, quiet: bool) -> Result<()> {
    let filter_level = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("dub_doc_search=debug,info")
    } else {
        EnvFilter::new("dub_doc_search=info,warn")
    };

    let env_filter = if quiet {
        EnvFilter::new("error")
    } else if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::try_from_default_env().unwrap_or(filter_level)
    } else {
        filter_level
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(!quiet)
        .with_line_number(!quiet)
        .with_file(!quiet)
        .with_ansi(true);

    match tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        Ok(()) => {
            if !quiet {
                info!("indexing/search core observability initialized");
            }
            Ok(())
        }
        // Already initialized — fine in tests that call this more than once.
        Err(_) => Ok(()),
    }
}

/// A lightweight trace context threaded through one logical operation
/// (one package's ingestion, one search query).
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub trace_id: Uuid,
    pub operation: String,
    pub start_time: Instant,
    pub attributes: Vec<(String, String)>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            operation: operation.into(),
            start_time: Instant::now(),
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((key.into(), value.into()));
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Log the outcome of an operation, incrementing the process-wide counters.
pub fn log_outcome<T>(ctx: &OperationContext, result: &Result<T>) {
    let attrs = ctx
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");

    match result {
        Ok(_) => {
            info!(
                trace_id = %ctx.trace_id,
                operation = %ctx.operation,
                elapsed_ms = ctx.elapsed().as_millis(),
                attributes = %attrs,
                "operation completed"
            );
            OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            error!(
                trace_id = %ctx.trace_id,
                operation = %ctx.operation,
                elapsed_ms = ctx.elapsed().as_millis(),
                attributes = %attrs,
                error = %e,
                "operation failed"
            );
            ERROR_COUNTER.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// RAII timer: logs elapsed time when dropped. Used to bracket ingestion
/// phases and batch search without threading a context through every branch.
pub struct PerfTimer {
    name: String,
    start: Instant,
    trace_id: Uuid,
}

impl PerfTimer {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trace_id = Uuid::new_v4();
        info!(trace_id = %trace_id, "timer started: {}", name);
        Self {
            name,
            start: Instant::now(),
            trace_id,
        }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        info!(
            trace_id = %self.trace_id,
            elapsed_ms = self.start.elapsed().as_millis(),
            "timer completed: {}", self.name
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_context_tracks_elapsed_time() {
        let ctx = OperationContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        std::thread::sleep(Duration::from_millis(2));
        assert!(ctx.elapsed().as_millis() >= 1);
    }

    #[test]
    fn log_outcome_does_not_panic_on_either_branch() {
        let ctx = OperationContext::new("op");
        log_outcome(&ctx, &Ok(42));
        log_outcome(&ctx, &Err::<i32, _>(anyhow::anyhow!("boom")));
    }

    #[test]
    fn perf_timer_logs_on_drop() {
        let _timer = PerfTimer::new("scoped_op");
    }
}
