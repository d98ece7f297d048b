//! monoio runtime for FIX sessions
//!
//! Sessions run single-threaded: the socket reader, writer and heartbeat
//! tasks of every session share one runtime thread. The timer driver is
//! always on since heartbeats and response timeouts depend on it.

use monoio::{FusionDriver, RuntimeBuilder};
use std::io;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// CPU core to bind the runtime thread to (None for no binding)
    pub cpu_core: Option<usize>,
    pub thread_name: String,
    /// io_uring submission queue entries
    pub entries: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cpu_core: None,
            thread_name: "keeper-fix".to_string(),
            entries: 256,
        }
    }
}

/// Single-threaded runtime wrapper
pub struct KeeperRuntime {
    config: RuntimeConfig,
}

impl KeeperRuntime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        if let Some(cpu_core) = config.cpu_core {
            match bind_to_cpu(cpu_core) {
                Ok(()) => info!("🔗 Bound to CPU core {}", cpu_core),
                Err(e) => warn!("Failed to bind to CPU core {}: {}", cpu_core, e),
            }
        }

        info!("🚀 Keeper runtime initialized (thread {}, cpu {:?})", config.thread_name, config.cpu_core);
        Self { config }
    }

    /// Run a future to completion on a fresh runtime.
    pub fn block_on<F>(&self, future: F) -> io::Result<F::Output>
    where
        F: std::future::Future,
    {
        let mut runtime = RuntimeBuilder::<FusionDriver>::new()
            .with_entries(self.config.entries)
            .enable_timer()
            .build()?;
        Ok(runtime.block_on(future))
    }

    pub fn start<F, Fut>(self, f: F) -> io::Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future,
    {
        info!("▶️  Starting keeper runtime");
        let result = self.block_on(f());
        info!("⏹️  Keeper runtime stopped");
        result
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}

impl Default for KeeperRuntime {
    fn default() -> Self {
        Self::new()
    }
}

pub fn run_keeper<F, Fut>(f: F) -> io::Result<Fut::Output>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    KeeperRuntime::new().start(f)
}

pub fn run_keeper_on_cpu<F, Fut>(cpu_core: usize, f: F) -> io::Result<Fut::Output>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let config = RuntimeConfig {
        cpu_core: Some(cpu_core),
        ..Default::default()
    };
    KeeperRuntime::with_config(config).start(f)
}

/// Pin the current thread to one core.
pub fn bind_to_cpu(cpu_core: usize) -> Result<(), String> {
    #[cfg(feature = "cpu-binding")]
    {
        let core_ids = core_affinity::get_core_ids().ok_or_else(|| "Failed to get CPU core IDs".to_string())?;
        let core_id = core_ids
            .get(cpu_core)
            .copied()
            .ok_or_else(|| format!("CPU core {} not available ({} cores)", cpu_core, core_ids.len()))?;

        if core_affinity::set_for_current(core_id) {
            Ok(())
        } else {
            Err(format!("Failed to bind to CPU core {cpu_core}"))
        }
    }

    #[cfg(not(feature = "cpu-binding"))]
    {
        let _ = cpu_core;
        Err("CPU binding disabled (compile with --features cpu-binding)".to_string())
    }
}
