//! Workspace-level indexing lifecycle.
//!
//! Composes the store, the parser bridge, the JAR indexer, the dependency
//! resolver/cache and the event bus into the initialize / update-file /
//! search / shutdown protocol. Parse jobs run on a bounded work-stealing
//! pool; results are committed one write transaction per file by the
//! collecting thread, so `FileIndexed` events fire in commit order.

use crate::config::Settings;
use crate::deps::{CommandRunner, DependencyCache, DependencyResolver, is_build_descriptor};
use crate::error::{IndexError, IndexResult};
use crate::events::{EventBus, FileIndexedEvent, WorkspaceIndexedEvent};
use crate::indexing::walker::FileWalker;
use crate::jar::JarIndexer;
use crate::memory::MemoryMonitor;
use crate::parsing::{Language, ParserBridge};
use crate::store::SymbolStore;
use crate::symbol::SymbolInfo;
use parking_lot::Mutex;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The index surface exposed to the rest of the language server.
pub trait WorkspaceIndexService {
    /// Discover, parse and persist the whole workspace, then publish a
    /// terminal `WorkspaceIndexedEvent`.
    fn initialize(&self) -> impl Future<Output = IndexResult<()>> + Send;

    /// React to a single changed path: re-resolve on build descriptors,
    /// atomically re-index source files, ignore everything else.
    fn update_file(&self, path: &Path) -> impl Future<Output = IndexResult<()>> + Send;

    /// Prefix query over stored symbols, served off the caller's thread.
    fn search_symbols(
        &self,
        query: &str,
    ) -> impl Future<Output = IndexResult<Arc<Vec<SymbolInfo>>>> + Send;

    /// Stop accepting work, close the store, report final cache statistics.
    fn shutdown(&self);
}

/// Default implementation of [`WorkspaceIndexService`].
#[derive(Clone)]
pub struct WorkspaceIndexer {
    workspace_root: PathBuf,
    settings: Arc<Settings>,
    store: Arc<SymbolStore>,
    cache: Arc<DependencyCache>,
    resolver: Arc<DependencyResolver>,
    events: Arc<EventBus>,
    bridge: Arc<ParserBridge>,
    jars: JarIndexer,
    pool: Arc<rayon::ThreadPool>,
    monitor: Arc<Mutex<Option<MemoryMonitor>>>,
    cancelled: Arc<AtomicBool>,
    shut_down: Arc<AtomicBool>,
}

impl WorkspaceIndexer {
    pub fn new(workspace_root: impl Into<PathBuf>, settings: Settings) -> IndexResult<Self> {
        let workspace_root = workspace_root.into();
        let resolver = Arc::new(DependencyResolver::new(&workspace_root));
        Self::with_resolver(workspace_root, settings, resolver)
    }

    /// Wire a custom command runner into dependency resolution.
    pub fn with_runner(
        workspace_root: impl Into<PathBuf>,
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
    ) -> IndexResult<Self> {
        let workspace_root = workspace_root.into();
        let resolver = Arc::new(DependencyResolver::with_runner(&workspace_root, runner));
        Self::with_resolver(workspace_root, settings, resolver)
    }

    fn with_resolver(
        workspace_root: PathBuf,
        settings: Settings,
        resolver: Arc<DependencyResolver>,
    ) -> IndexResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.indexing.parallel_threads.max(1))
            .thread_name(|i| format!("index-worker-{i}"))
            .build()
            .map_err(|err| IndexError::TaskFailed {
                reason: format!("failed to build worker pool: {err}"),
            })?;

        let cache = Arc::new(DependencyCache::new());
        let monitor = MemoryMonitor::start(
            Arc::clone(&cache),
            Duration::from_secs(settings.memory.check_interval_secs.max(1)),
            settings.memory_target_mb(),
        );

        Ok(Self {
            workspace_root,
            settings: Arc::new(settings),
            store: Arc::new(SymbolStore::new()),
            cache,
            resolver,
            events: Arc::new(EventBus::new()),
            bridge: Arc::new(ParserBridge::new()),
            jars: JarIndexer::new(),
            pool: Arc::new(pool),
            monitor: Arc::new(Mutex::new(Some(monitor))),
            cancelled: Arc::new(AtomicBool::new(false)),
            shut_down: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn store(&self) -> &Arc<SymbolStore> {
        &self.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn dependency_cache(&self) -> &Arc<DependencyCache> {
        &self.cache
    }

    /// Cached dependencies when fresh, otherwise a full resolution whose
    /// result (empty included) is cached to prevent retry storms.
    fn dependencies(&self) -> Vec<PathBuf> {
        if let Some(cached) = self.cache.get_cached_dependencies(&self.workspace_root) {
            return cached;
        }
        let resolved = self.resolver.resolve_dependencies();
        self.cache
            .cache_dependencies(&self.workspace_root, resolved.clone());
        resolved
    }

    fn initialize_blocking(&self) -> IndexResult<()> {
        let started = Instant::now();
        info!("initializing index for {}", self.workspace_root.display());

        self.store.initialize(
            &self.settings.index_path(&self.workspace_root),
            self.settings.store.map_size_bytes,
        )?;

        let dependencies = self.dependencies();
        // Share one class-loading context per dependency set across every
        // downstream consumer of this workspace.
        let _context = self.cache.get_or_create_class_loader(&dependencies);

        let files: Vec<PathBuf> = FileWalker::new(Arc::clone(&self.settings))
            .walk(&self.workspace_root)
            .collect();
        info!("discovered {} candidate files", files.len());

        let (tx, rx) = crossbeam_channel::unbounded();
        for path in files {
            let tx = tx.clone();
            let bridge = Arc::clone(&self.bridge);
            let cancelled = Arc::clone(&self.cancelled);
            self.pool.spawn(move || {
                let outcome = if cancelled.load(Ordering::Relaxed) {
                    None
                } else {
                    Some(bridge.parse_file(&path))
                };
                let _ = tx.send((path, outcome));
            });
        }
        drop(tx);

        let mut total_files = 0u64;
        let mut total_symbols = 0u64;
        while let Ok((path, outcome)) = rx.recv() {
            // Cancelled before the job started: skipped entirely.
            let Some(outcome) = outcome else { continue };
            match self.store.replace_file_symbols(&path, &outcome.symbols) {
                Ok(()) => {
                    total_files += 1;
                    total_symbols += outcome.symbols.len() as u64;
                    self.events.publish(&FileIndexedEvent::new(
                        path,
                        outcome.symbols,
                        outcome.success,
                    ));
                }
                Err(err) => {
                    warn!("failed to persist {}: {err}", path.display());
                }
            }
        }

        for dependency in &dependencies {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            if dependency.extension().and_then(|e| e.to_str()) != Some("jar") {
                continue;
            }
            let symbols = self.jars.index_jar(dependency);
            match self.store.replace_dependency_symbols(dependency, &symbols) {
                Ok(()) => total_symbols += symbols.len() as u64,
                Err(err) => warn!(
                    "failed to persist dependency {}: {err}",
                    dependency.display()
                ),
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "workspace indexed: {total_files} files, {total_symbols} symbols in {duration_ms} ms"
        );
        self.events.publish(&WorkspaceIndexedEvent::new(
            self.workspace_root.clone(),
            total_files,
            total_symbols,
            duration_ms,
        ));
        Ok(())
    }

    fn update_file_blocking(&self, path: &Path) -> IndexResult<()> {
        if is_build_descriptor(path) {
            info!("build descriptor changed: {}", path.display());
            self.cache.invalidate_project(&self.workspace_root);
            return self.initialize_blocking();
        }

        match Language::from_path(path) {
            Some(Language::Java) if !self.settings.indexing.include_java => Ok(()),
            Some(_) => {
                if !path.exists() {
                    // Deleted file: drop its record and symbols atomically.
                    self.store.remove_file(path)?;
                    self.events
                        .publish(&FileIndexedEvent::new(path.to_path_buf(), Vec::new(), true));
                    return Ok(());
                }
                let outcome = self.bridge.parse_file(path);
                self.store.replace_file_symbols(path, &outcome.symbols)?;
                self.events.publish(&FileIndexedEvent::new(
                    path.to_path_buf(),
                    outcome.symbols,
                    outcome.success,
                ));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl WorkspaceIndexService for WorkspaceIndexer {
    fn initialize(&self) -> impl Future<Output = IndexResult<()>> + Send {
        let this = self.clone();
        async move {
            tokio::task::spawn_blocking(move || this.initialize_blocking())
                .await
                .map_err(|err| IndexError::TaskFailed {
                    reason: err.to_string(),
                })?
        }
    }

    fn update_file(&self, path: &Path) -> impl Future<Output = IndexResult<()>> + Send {
        let this = self.clone();
        let path = path.to_path_buf();
        async move {
            tokio::task::spawn_blocking(move || this.update_file_blocking(&path))
                .await
                .map_err(|err| IndexError::TaskFailed {
                    reason: err.to_string(),
                })?
        }
    }

    fn search_symbols(
        &self,
        query: &str,
    ) -> impl Future<Output = IndexResult<Arc<Vec<SymbolInfo>>>> + Send {
        let store = Arc::clone(&self.store);
        let query = query.to_string();
        async move {
            tokio::task::spawn_blocking(move || store.search(&query))
                .await
                .map_err(|err| IndexError::TaskFailed {
                    reason: err.to_string(),
                })?
                .map_err(IndexError::from)
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(mut monitor) = self.monitor.lock().take() {
            monitor.stop();
        }
        let stats = self.cache.stats();
        info!(
            "shutting down index: cache hits={} misses={} evictions={} loaders={} deps={} mem={}MB",
            stats.hits,
            stats.misses,
            stats.evictions,
            stats.class_loader_count,
            stats.dependency_cache_size,
            stats.total_memory_usage_mb
        );
        self.store.close();
    }
}
