//! Dependency cache: resolved classpaths and shared class-loading contexts.
//!
//! The class-loader table holds weak references only. A handle stays
//! reusable while any consumer holds it strongly; once consumers drop it,
//! the runtime reclaims the context and the cache notices lazily on the
//! next lookup. Resolved dependency sets are cached per project with a
//! one-hour wall-clock expiry. All counters are atomics so statistics reads
//! never block writers.

use crate::deps::loader::{ClassLoaderContext, ClassLoaderHandle, canonical_key};
use crate::memory;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Live class-loader table cap. Inserting past it evicts the oldest entry.
pub const MAX_CLASS_LOADERS: usize = 100;
/// Wall-clock expiry of cached dependency sets.
pub const DEPENDENCY_TTL_SECS: i64 = 3600;
/// Minimum wall-clock gap between effective eviction passes.
pub const EVICTION_CHECK_INTERVAL_SECS: u64 = 60;

/// Point-in-time counters and gauges. Counters grow monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub class_loader_count: usize,
    pub dependency_cache_size: usize,
    pub total_memory_usage_mb: u64,
}

struct LoaderSlot {
    handle: Weak<ClassLoaderContext>,
    last_access: AtomicU64,
}

struct CachedDeps {
    deps: Vec<PathBuf>,
    cached_at: DateTime<Utc>,
}

pub struct DependencyCache {
    created_at: Instant,
    loaders: RwLock<HashMap<String, LoaderSlot>>,
    deps: RwLock<HashMap<PathBuf, CachedDeps>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    last_eviction_check: Mutex<Option<Instant>>,
}

impl Default for DependencyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyCache {
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
            loaders: RwLock::new(HashMap::new()),
            deps: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            last_eviction_check: Mutex::new(None),
        }
    }

    fn now_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }

    /// Get or create the shared class-loading context for a dependency set.
    /// The set is canonicalized by sorting, so permutations share a handle.
    pub fn get_or_create_class_loader(&self, deps: &[PathBuf]) -> ClassLoaderHandle {
        self.get_or_create_class_loader_with_key(&canonical_key(deps), deps)
    }

    /// Same, under a caller-supplied logical key (e.g.
    /// `maven:com.acme:lib:1.2`).
    pub fn get_or_create_class_loader_with_key(
        &self,
        key: &str,
        deps: &[PathBuf],
    ) -> ClassLoaderHandle {
        // Hot path: a live handle under the read lock.
        {
            let table = self.loaders.read();
            if let Some(slot) = table.get(key) {
                if let Some(handle) = slot.handle.upgrade() {
                    slot.last_access.store(self.now_ms(), Ordering::Relaxed);
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return handle;
                }
            }
        }

        let mut table = self.loaders.write();
        // Another thread may have won the race while we waited.
        if let Some(slot) = table.get(key) {
            if let Some(handle) = slot.handle.upgrade() {
                slot.last_access.store(self.now_ms(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return handle;
            }
        }

        let handle = ClassLoaderHandle::new(ClassLoaderContext::new(
            key.to_string(),
            deps.to_vec(),
        ));
        table.insert(
            key.to_string(),
            LoaderSlot {
                handle: ClassLoaderHandle::downgrade(&handle),
                last_access: AtomicU64::new(self.now_ms()),
            },
        );
        self.misses.fetch_add(1, Ordering::Relaxed);

        // Reclaimed contexts are detected lazily; purge their slots before
        // judging the cap so dead weights never force out live entries.
        table.retain(|_, slot| slot.handle.strong_count() > 0);
        while table.len() > MAX_CLASS_LOADERS {
            let oldest = table
                .iter()
                .min_by_key(|(_, slot)| slot.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    table.remove(&k);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }

        handle
    }

    /// Cache a resolved dependency set for a project.
    pub fn cache_dependencies(&self, project_path: &Path, deps: Vec<PathBuf>) {
        self.deps.write().insert(
            project_path.to_path_buf(),
            CachedDeps {
                deps,
                cached_at: Utc::now(),
            },
        );
    }

    /// Return the cached dependency set unless absent or expired.
    pub fn get_cached_dependencies(&self, project_path: &Path) -> Option<Vec<PathBuf>> {
        let table = self.deps.read();
        let cached = table.get(project_path)?;
        let age = Utc::now().signed_duration_since(cached.cached_at);
        if age.num_seconds() >= DEPENDENCY_TTL_SECS {
            return None;
        }
        Some(cached.deps.clone())
    }

    /// Drop the project's dependency record and every class-loader entry
    /// whose key contains the project path's string form.
    pub fn invalidate_project(&self, project_path: &Path) {
        let needle = project_path.display().to_string();
        self.deps.write().remove(project_path);
        let mut table = self.loaders.write();
        let before = table.len();
        table.retain(|key, _| !key.contains(&needle));
        if table.len() < before {
            debug!(
                "invalidated {} class loaders for {}",
                before - table.len(),
                needle
            );
        }
    }

    /// Drop everything. Contexts close once their last consumer drops.
    pub fn invalidate_all(&self) {
        self.loaders.write().clear();
        self.deps.write().clear();
        info!("dependency cache invalidated");
    }

    /// Rate-limited memory-pressure eviction: when current process memory
    /// exceeds `target_memory_mb`, drop the least-recently-used half of the
    /// class-loader table. Returns the number of evicted entries.
    pub fn evict_if_needed(&self, target_memory_mb: u64) -> usize {
        {
            let mut last = self.last_eviction_check.lock();
            if let Some(at) = *last {
                if at.elapsed().as_secs() < EVICTION_CHECK_INTERVAL_SECS {
                    return 0;
                }
            }
            *last = Some(Instant::now());
        }

        let current_mb = memory::process_memory_mb();
        if current_mb <= target_memory_mb {
            return 0;
        }

        let mut table = self.loaders.write();
        let n = table.len();
        if n == 0 {
            return 0;
        }
        let to_evict = n.div_ceil(2);
        let mut by_age: Vec<(String, u64)> = table
            .iter()
            .map(|(k, slot)| (k.clone(), slot.last_access.load(Ordering::Relaxed)))
            .collect();
        by_age.sort_by_key(|(_, at)| *at);
        for (key, _) in by_age.into_iter().take(to_evict) {
            table.remove(&key);
        }
        self.evictions.fetch_add(to_evict as u64, Ordering::Relaxed);
        info!(
            "memory pressure ({current_mb} MB > {target_memory_mb} MB): evicted {to_evict} class loaders"
        );
        to_evict
    }

    /// Snapshot of counters and gauges. Never blocks writers for long: the
    /// table sizes are read under short read locks, the counters are atomics.
    pub fn stats(&self) -> CacheStatistics {
        CacheStatistics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            class_loader_count: self.loaders.read().len(),
            dependency_cache_size: self.deps.read().len(),
            total_memory_usage_mb: memory::process_memory_mb(),
        }
    }
}
