//! Process memory readings and the background pressure loop.
//!
//! A single dedicated worker wakes on a fixed interval, reads the process
//! RSS and asks the dependency cache to evict when the reading exceeds the
//! configured target. The worker holds no locks across its sleep; the
//! per-minute rate limit inside the cache protects against storms.

use crate::deps::DependencyCache;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, System};
use tracing::{debug, info};

/// Current process resident set size, in mebibytes.
pub fn process_memory_mb() -> u64 {
    let mut sys = System::new();
    let pid = Pid::from_u32(std::process::id());
    sys.refresh_processes_specifics(
        sysinfo::ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    sys.process(pid)
        .map(|process| process.memory() / (1024 * 1024))
        .unwrap_or(0)
}

struct Shared {
    stop: Mutex<bool>,
    wake: Condvar,
}

/// Periodic memory-pressure monitor driving cache eviction.
pub struct MemoryMonitor {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    /// Spawn the monitor. `target_memory_mb` is the eviction threshold
    /// (typically 70 % of the configured memory budget).
    pub fn start(
        cache: Arc<DependencyCache>,
        interval: Duration,
        target_memory_mb: u64,
    ) -> Self {
        let shared = Arc::new(Shared {
            stop: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);

        let handle = std::thread::Builder::new()
            .name("memory-monitor".to_string())
            .spawn(move || {
                loop {
                    {
                        let mut stopped = thread_shared.stop.lock();
                        if *stopped {
                            break;
                        }
                        thread_shared.wake.wait_for(&mut stopped, interval);
                        if *stopped {
                            break;
                        }
                    }
                    let current = process_memory_mb();
                    debug!("memory check: {current} MB (target {target_memory_mb} MB)");
                    cache.evict_if_needed(target_memory_mb);
                }
            })
            .ok();

        if handle.is_some() {
            info!(
                "memory monitor started (interval {:?}, target {} MB)",
                interval, target_memory_mb
            );
        }
        Self {
            shared,
            handle,
        }
    }

    /// Stop the worker and join it.
    pub fn stop(&mut self) {
        *self.shared.stop.lock() = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_memory_is_positive() {
        assert!(process_memory_mb() > 0);
    }

    #[test]
    fn test_monitor_stops_promptly() {
        let cache = Arc::new(DependencyCache::new());
        let mut monitor = MemoryMonitor::start(cache, Duration::from_secs(300), 1_000_000);
        let started = std::time::Instant::now();
        monitor.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
