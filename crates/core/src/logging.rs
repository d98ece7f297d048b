//! Unified logging
//!
//! All keeper crates log through `tracing`. `init_logging` installs a
//! process-wide subscriber once; `RUST_LOG` selects levels (default `info`).
//! Building with the `ftlog` feature routes output through ftlog instead.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global logger. Safe to call more than once.
pub fn init_logging() {
    INIT.call_once(|| {
        #[cfg(feature = "ftlog")]
        init_ftlog();

        #[cfg(not(feature = "ftlog"))]
        init_tracing();
    });
}

#[cfg(feature = "ftlog")]
fn init_ftlog() {
    match ftlog::builder()
        .max_log_level(ftlog::LevelFilter::Debug)
        .bounded(100_000, false)
        .utc()
        .try_init()
    {
        Ok(guard) => {
            // the guard flushes on drop; logging lives for the whole process
            std::mem::forget(guard);
            tracing::info!("📝 Initialized ftlog logging");
        }
        Err(e) => eprintln!("ftlog initialisation failed: {e}"),
    }
}

#[cfg(not(feature = "ftlog"))]
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    // a test harness or the host application may already own the subscriber
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        tracing::info!("📝 Initialized tracing logging");
    }
}

/// Render a raw FIX frame for logs, with SOH shown as `|`.
pub fn fix_printable(raw: &[u8]) -> String {
    raw.iter()
        .map(|&b| if b == 0x01 { '|' } else { b as char })
        .collect()
}

#[macro_export]
macro_rules! log_latency {
    ($operation:expr, $duration_micros:expr) => {
        if $duration_micros < 1000 {
            tracing::debug!("⚡ {} completed in {}μs", $operation, $duration_micros);
        } else {
            tracing::info!("⚡ {} completed in {:.3}ms", $operation, $duration_micros as f64 / 1000.0);
        }
    };
}

#[macro_export]
macro_rules! log_order {
    ($action:expr, $order_id:expr, $symbol:expr) => {
        tracing::info!("📋 ORDER {}: {} ({})", $action, $order_id, $symbol);
    };
}

#[macro_export]
macro_rules! log_error {
    ($operation:expr, $error:expr) => {
        tracing::error!("❌ {} failed: {}", $operation, $error);
    };
}

/// `log_fix!("sent", session, raw_bytes)`
#[macro_export]
macro_rules! log_fix {
    ($direction:expr, $session:expr, $raw:expr) => {
        tracing::debug!("{} {} {}", $session, $direction, $crate::logging::fix_printable($raw));
    };
}
