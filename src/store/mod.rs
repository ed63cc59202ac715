//! Persistent symbol storage.
//!
//! One LMDB environment per workspace (under `<root>/.groovy-lsp/index/`),
//! holding three named databases: `symbols`, `files` and `dependencies`.
//! LMDB gives us exactly the concurrency contract the index needs: one
//! writer, unlimited snapshot readers, neither blocking the other, and
//! atomic commit so partial writes cannot be observed or persisted.
//!
//! Keys in the `symbols` database are `name:kind:location:line:column`, so a
//! name-prefix query is a raw prefix range scan. Values carry the full
//! pipe-delimited record (see [`crate::symbol::SymbolInfo`]).

use crate::error::{StoreError, StoreResult};
use crate::symbol::SymbolInfo;
use dashmap::DashMap;
use heed::types::Str;
use heed::{Database, Env, EnvOpenOptions};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Default maximum size of the memory map: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

struct StoreInner {
    env: Env,
    symbols: Database<Str, Str>,
    files: Database<Str, Str>,
    dependencies: Database<Str, Str>,
}

/// Embedded key-value store for symbols, file records and dependency records.
pub struct SymbolStore {
    inner: RwLock<Option<StoreInner>>,
    query_cache: DashMap<String, Arc<Vec<SymbolInfo>>>,
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolStore {
    /// Create an uninitialized store. Every operation except
    /// [`initialize`](Self::initialize) fails with
    /// [`StoreError::NotInitialized`] until the environment is opened.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
            query_cache: DashMap::new(),
        }
    }

    /// Open (or create) the environment at `index_path` with the given map
    /// size and open the three databases. Idempotent once successful.
    pub fn initialize(&self, index_path: &Path, map_size: usize) -> StoreResult<()> {
        let mut guard = self.inner.write();
        if guard.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(index_path).map_err(|source| StoreError::CreateDir {
            path: index_path.to_path_buf(),
            source,
        })?;

        // SAFETY: the environment is opened once per workspace and only
        // through this store; no other process-level aliasing of the map.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(3)
                .open(index_path)
        }
        .map_err(|source| StoreError::InitFailed {
            path: index_path.to_path_buf(),
            source,
        })?;

        let mut wtxn = env.write_txn().map_err(io("initialize"))?;
        let symbols = env
            .create_database(&mut wtxn, Some("symbols"))
            .map_err(io("initialize"))?;
        let files = env
            .create_database(&mut wtxn, Some("files"))
            .map_err(io("initialize"))?;
        let dependencies = env
            .create_database(&mut wtxn, Some("dependencies"))
            .map_err(io("initialize"))?;
        wtxn.commit().map_err(io("initialize"))?;

        info!("symbol store opened at {}", index_path.display());
        *guard = Some(StoreInner {
            env,
            symbols,
            files,
            dependencies,
        });
        Ok(())
    }

    /// Whether `initialize` has succeeded and `close` has not been called.
    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Insert one symbol in its own write transaction. Idempotent on the
    /// uniqueness tuple (the key encodes the whole tuple).
    pub fn add_symbol(&self, symbol: &SymbolInfo) -> StoreResult<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let mut wtxn = inner.env.write_txn().map_err(io("addSymbol"))?;
        inner
            .symbols
            .put(&mut wtxn, &symbol.store_key(), &symbol.serialize_record())
            .map_err(io("addSymbol"))?;
        wtxn.commit().map_err(io("addSymbol"))?;

        self.query_cache.clear();
        Ok(())
    }

    /// Upsert a file record with the current timestamp.
    pub fn add_file(&self, path: &Path) -> StoreResult<()> {
        self.upsert_record(path, "addFile", |inner| inner.files)
    }

    /// Upsert a dependency record with the current timestamp.
    pub fn add_dependency(&self, path: &Path) -> StoreResult<()> {
        self.upsert_record(path, "addDependency", |inner| inner.dependencies)
    }

    fn upsert_record(
        &self,
        path: &Path,
        operation: &'static str,
        table: impl Fn(&StoreInner) -> Database<Str, Str>,
    ) -> StoreResult<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let key = path.display().to_string();
        let value = chrono::Utc::now().timestamp_millis().to_string();
        let mut wtxn = inner.env.write_txn().map_err(io(operation))?;
        table(inner)
            .put(&mut wtxn, &key, &value)
            .map_err(io(operation))?;
        wtxn.commit().map_err(io(operation))?;
        Ok(())
    }

    /// Remove a file record and every symbol located in that file, in one
    /// atomic transaction.
    pub fn remove_file(&self, path: &Path) -> StoreResult<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let mut wtxn = inner.env.write_txn().map_err(io("removeFile"))?;
        let removed = delete_symbols_for(inner, &mut wtxn, path)?;
        inner
            .files
            .delete(&mut wtxn, &path.display().to_string())
            .map_err(io("removeFile"))?;
        wtxn.commit().map_err(io("removeFile"))?;

        debug!("removed {removed} symbols for {}", path.display());
        self.query_cache.clear();
        Ok(())
    }

    /// The atomic per-file update: drop every symbol previously stored for
    /// `path`, refresh the file record, insert the new symbols. No reader
    /// sees the intermediate state.
    pub fn replace_file_symbols(&self, path: &Path, symbols: &[SymbolInfo]) -> StoreResult<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let mut wtxn = inner.env.write_txn().map_err(io("updateFile"))?;
        delete_symbols_for(inner, &mut wtxn, path)?;
        inner
            .files
            .put(
                &mut wtxn,
                &path.display().to_string(),
                &chrono::Utc::now().timestamp_millis().to_string(),
            )
            .map_err(io("updateFile"))?;
        for symbol in symbols {
            inner
                .symbols
                .put(&mut wtxn, &symbol.store_key(), &symbol.serialize_record())
                .map_err(io("updateFile"))?;
        }
        wtxn.commit().map_err(io("updateFile"))?;

        self.query_cache.clear();
        Ok(())
    }

    /// Store symbols extracted from a dependency archive together with its
    /// dependency record, in one transaction. Symbols from an earlier scan
    /// of the same archive (virtual locations under `<path>!/`) are dropped
    /// first, so a changed archive leaves nothing stale behind.
    pub fn replace_dependency_symbols(
        &self,
        path: &Path,
        symbols: &[SymbolInfo],
    ) -> StoreResult<()> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let virtual_prefix = format!("{}!/", path.display());
        let mut wtxn = inner.env.write_txn().map_err(io("addDependency"))?;
        let mut doomed = Vec::new();
        for entry in inner.symbols.iter(&wtxn).map_err(io("addDependency"))? {
            let (key, value) = entry.map_err(io("addDependency"))?;
            let symbol = SymbolInfo::deserialize_record(value)?;
            if symbol
                .location()
                .display()
                .to_string()
                .starts_with(&virtual_prefix)
            {
                doomed.push(key.to_string());
            }
        }
        for key in &doomed {
            inner
                .symbols
                .delete(&mut wtxn, key)
                .map_err(io("addDependency"))?;
        }
        inner
            .dependencies
            .put(
                &mut wtxn,
                &path.display().to_string(),
                &chrono::Utc::now().timestamp_millis().to_string(),
            )
            .map_err(io("addDependency"))?;
        for symbol in symbols {
            inner
                .symbols
                .put(&mut wtxn, &symbol.store_key(), &symbol.serialize_record())
                .map_err(io("addDependency"))?;
        }
        wtxn.commit().map_err(io("addDependency"))?;

        self.query_cache.clear();
        Ok(())
    }

    /// Prefix search over symbol names. An empty query scans the whole
    /// symbols table. Results are materialized in key order; repeated
    /// queries are served from an in-process cache until the next write.
    pub fn search(&self, query: &str) -> StoreResult<Arc<Vec<SymbolInfo>>> {
        if let Some(hit) = self.query_cache.get(query) {
            return Ok(Arc::clone(hit.value()));
        }

        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let rtxn = inner.env.read_txn().map_err(io("search"))?;
        let mut results = Vec::new();
        if query.is_empty() {
            for entry in inner.symbols.iter(&rtxn).map_err(io("search"))? {
                let (_, value) = entry.map_err(io("search"))?;
                results.push(SymbolInfo::deserialize_record(value)?);
            }
        } else {
            for entry in inner
                .symbols
                .prefix_iter(&rtxn, query)
                .map_err(io("search"))?
            {
                let (_, value) = entry.map_err(io("search"))?;
                results.push(SymbolInfo::deserialize_record(value)?);
            }
        }
        drop(rtxn);

        let results = Arc::new(results);
        self.query_cache
            .insert(query.to_string(), Arc::clone(&results));
        Ok(results)
    }

    /// Every stored symbol whose location equals `path`.
    pub fn get_file_symbols(&self, path: &Path) -> StoreResult<Vec<SymbolInfo>> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let rtxn = inner.env.read_txn().map_err(io("getFileSymbols"))?;
        let mut results = Vec::new();
        for entry in inner.symbols.iter(&rtxn).map_err(io("getFileSymbols"))? {
            let (_, value) = entry.map_err(io("getFileSymbols"))?;
            let symbol = SymbolInfo::deserialize_record(value)?;
            if symbol.location() == path {
                results.push(symbol);
            }
        }
        Ok(results)
    }

    /// Millisecond timestamp of the last successful indexing of `path`, if
    /// a file record exists.
    pub fn file_indexed_at(&self, path: &Path) -> StoreResult<Option<i64>> {
        self.record_timestamp(path, "fileIndexedAt", |inner| inner.files)
    }

    /// Millisecond timestamp of the last indexing of a dependency archive.
    pub fn dependency_indexed_at(&self, path: &Path) -> StoreResult<Option<i64>> {
        self.record_timestamp(path, "dependencyIndexedAt", |inner| inner.dependencies)
    }

    fn record_timestamp(
        &self,
        path: &Path,
        operation: &'static str,
        table: impl Fn(&StoreInner) -> Database<Str, Str>,
    ) -> StoreResult<Option<i64>> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;

        let rtxn = inner.env.read_txn().map_err(io(operation))?;
        let value = table(inner)
            .get(&rtxn, &path.display().to_string())
            .map_err(io(operation))?;
        match value {
            None => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| StoreError::Corrupt {
                    reason: format!("non-numeric timestamp '{raw}'"),
                }),
        }
    }

    /// Number of stored symbols.
    pub fn symbol_count(&self) -> StoreResult<u64> {
        self.table_len("symbolCount", |inner| inner.symbols)
    }

    /// Number of file records.
    pub fn file_count(&self) -> StoreResult<u64> {
        self.table_len("fileCount", |inner| inner.files)
    }

    /// Number of dependency records.
    pub fn dependency_count(&self) -> StoreResult<u64> {
        self.table_len("dependencyCount", |inner| inner.dependencies)
    }

    fn table_len(
        &self,
        operation: &'static str,
        table: impl Fn(&StoreInner) -> Database<Str, Str>,
    ) -> StoreResult<u64> {
        let guard = self.inner.read();
        let inner = guard.as_ref().ok_or(StoreError::NotInitialized)?;
        let rtxn = inner.env.read_txn().map_err(io(operation))?;
        table(inner).len(&rtxn).map_err(io(operation))
    }

    /// Flush and release the environment. Idempotent; subsequent operations
    /// fail with [`StoreError::NotInitialized`].
    pub fn close(&self) {
        let mut guard = self.inner.write();
        if guard.take().is_some() {
            self.query_cache.clear();
            info!("symbol store closed");
        }
    }
}

/// Delete every symbol whose deserialized location equals `path` inside the
/// given write transaction. Returns the number of deleted entries.
fn delete_symbols_for(
    inner: &StoreInner,
    wtxn: &mut heed::RwTxn<'_>,
    path: &Path,
) -> StoreResult<usize> {
    let mut doomed = Vec::new();
    for entry in inner.symbols.iter(wtxn).map_err(io("removeFile"))? {
        let (key, value) = entry.map_err(io("removeFile"))?;
        let symbol = SymbolInfo::deserialize_record(value)?;
        if symbol.location() == path {
            doomed.push(key.to_string());
        }
    }
    for key in &doomed {
        inner
            .symbols
            .delete(wtxn, key)
            .map_err(io("removeFile"))?;
    }
    Ok(doomed.len())
}

fn io(operation: &'static str) -> impl Fn(heed::Error) -> StoreError {
    move |source| StoreError::Io { operation, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SymbolKind;
    use tempfile::TempDir;

    fn symbol(name: &str, kind: SymbolKind, location: &str) -> SymbolInfo {
        SymbolInfo::new(name, kind, location, 1, 1).unwrap()
    }

    fn open_store(dir: &TempDir) -> SymbolStore {
        let store = SymbolStore::new();
        store
            .initialize(&dir.path().join("index"), 64 * 1024 * 1024)
            .unwrap();
        store
    }

    #[test]
    fn test_operations_require_initialization() {
        let store = SymbolStore::new();
        let err = store.search("").unwrap_err();
        assert!(matches!(err, StoreError::NotInitialized));
    }

    #[test]
    fn test_add_symbol_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let s = symbol("a.Foo", SymbolKind::Class, "Foo.groovy");
        store.add_symbol(&s).unwrap();
        store.add_symbol(&s).unwrap();
        assert_eq!(store.symbol_count().unwrap(), 1);
    }

    #[test]
    fn test_prefix_search_sound_and_complete() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .add_symbol(&symbol("a.Foo", SymbolKind::Class, "Foo.groovy"))
            .unwrap();
        store
            .add_symbol(&symbol("a.Foo.bar", SymbolKind::Property, "Foo.groovy"))
            .unwrap();
        store
            .add_symbol(&symbol("b.Baz", SymbolKind::Class, "Baz.groovy"))
            .unwrap();

        let hits = store.search("a.Foo").unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|s| s.name().starts_with("a.Foo")));

        let all = store.search("").unwrap();
        assert_eq!(all.len(), 3);

        assert!(store.search("zzz").unwrap().is_empty());
    }

    #[test]
    fn test_remove_file_drops_all_symbols_for_path() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .add_symbol(&symbol("a.Foo", SymbolKind::Class, "Foo.groovy"))
            .unwrap();
        store
            .add_symbol(&symbol("a.Foo.bar", SymbolKind::Property, "Foo.groovy"))
            .unwrap();
        store
            .add_symbol(&symbol("b.Baz", SymbolKind::Class, "Baz.groovy"))
            .unwrap();
        store.add_file(Path::new("Foo.groovy")).unwrap();

        store.remove_file(Path::new("Foo.groovy")).unwrap();

        assert!(store.search("a.Foo").unwrap().is_empty());
        assert_eq!(store.search("").unwrap().len(), 1);
        assert_eq!(store.file_indexed_at(Path::new("Foo.groovy")).unwrap(), None);
    }

    #[test]
    fn test_replace_is_atomic_and_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let path = Path::new("Foo.groovy");
        let first = vec![symbol("a.Foo", SymbolKind::Class, "Foo.groovy")];
        let second = vec![
            symbol("a.Foo", SymbolKind::Class, "Foo.groovy"),
            symbol("a.Foo.bar", SymbolKind::Property, "Foo.groovy"),
        ];

        store.replace_file_symbols(path, &first).unwrap();
        store.replace_file_symbols(path, &second).unwrap();
        store.replace_file_symbols(path, &second).unwrap();

        let stored = store.get_file_symbols(path).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(store.file_indexed_at(path).unwrap().is_some());
    }

    #[test]
    fn test_dependency_replace_drops_stale_archive_symbols() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let jar = Path::new("/deps/lib.jar");
        let old = vec![symbol("old.Gone", SymbolKind::Class, "/deps/lib.jar!/old/Gone.class")];
        let new = vec![symbol("new.Here", SymbolKind::Class, "/deps/lib.jar!/new/Here.class")];

        store.replace_dependency_symbols(jar, &old).unwrap();
        store.replace_dependency_symbols(jar, &new).unwrap();

        assert!(store.search("old.Gone").unwrap().is_empty());
        assert_eq!(store.search("new.Here").unwrap().len(), 1);
        assert!(store.dependency_indexed_at(jar).unwrap().is_some());
    }

    #[test]
    fn test_query_cache_invalidated_by_writes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .add_symbol(&symbol("a.Foo", SymbolKind::Class, "Foo.groovy"))
            .unwrap();
        assert_eq!(store.search("a.").unwrap().len(), 1);

        store
            .add_symbol(&symbol("a.Bar", SymbolKind::Class, "Bar.groovy"))
            .unwrap();
        assert_eq!(store.search("a.").unwrap().len(), 2);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let index = dir.path().join("index");
        {
            let store = SymbolStore::new();
            store.initialize(&index, 64 * 1024 * 1024).unwrap();
            store
                .add_symbol(&symbol("a.Foo", SymbolKind::Class, "Foo.groovy"))
                .unwrap();
            store.close();
        }
        let store = SymbolStore::new();
        store.initialize(&index, 64 * 1024 * 1024).unwrap();
        assert_eq!(store.search("a.Foo").unwrap().len(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.close();
        store.close();
        assert!(matches!(
            store.search("").unwrap_err(),
            StoreError::NotInitialized
        ));
    }
}
