//! Class-loading contexts.
//!
//! A context is a dynamically-assembled, ordered set of dependency paths
//! (archives or exploded directories) that can locate class resources by
//! internal name. Contexts are heavy to share-nothing per consumer, so the
//! dependency cache hands out reference-counted handles and keeps only a
//! weak counterpart: any live consumer keeps the context alive, the cache
//! itself never does.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zip::ZipArchive;

/// Shared, reference-counted handle to a class-loading context.
pub type ClassLoaderHandle = Arc<ClassLoaderContext>;

/// An immutable class-loading context over a set of dependency paths.
#[derive(Debug)]
pub struct ClassLoaderContext {
    key: String,
    entries: Vec<PathBuf>,
}

impl ClassLoaderContext {
    pub fn new(key: String, entries: Vec<PathBuf>) -> Self {
        debug!("creating class loader '{key}' over {} entries", entries.len());
        Self { key, entries }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Locate a class resource by internal name (`com/example/Foo`),
    /// searching entries in order.
    pub fn find_class(&self, internal_name: &str) -> Option<Vec<u8>> {
        let resource = format!("{internal_name}.class");
        for entry in &self.entries {
            if entry.is_dir() {
                let candidate = entry.join(&resource);
                if let Ok(bytes) = std::fs::read(&candidate) {
                    return Some(bytes);
                }
                continue;
            }
            let Ok(file) = File::open(entry) else {
                continue;
            };
            let Ok(mut archive) = ZipArchive::new(file) else {
                continue;
            };
            if let Ok(mut zip_entry) = archive.by_name(&resource) {
                let mut bytes = Vec::with_capacity(zip_entry.size() as usize);
                if zip_entry.read_to_end(&mut bytes).is_ok() {
                    return Some(bytes);
                }
            }
        }
        None
    }
}

/// Canonical cache key for a dependency set: the sorted paths joined with
/// the classpath separator.
pub fn canonical_key(deps: &[PathBuf]) -> String {
    let mut sorted: Vec<String> = deps.iter().map(|p| p.display().to_string()).collect();
    sorted.sort();
    sorted.dedup();
    sorted.join(":")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_canonical_key_is_order_independent() {
        let a = [PathBuf::from("/b.jar"), PathBuf::from("/a.jar")];
        let b = [PathBuf::from("/a.jar"), PathBuf::from("/b.jar")];
        assert_eq!(canonical_key(&a), canonical_key(&b));
        assert_eq!(canonical_key(&a), "/a.jar:/b.jar");
    }

    #[test]
    fn test_find_class_in_directory_and_archive() {
        let dir = TempDir::new().unwrap();

        let exploded = dir.path().join("classes");
        std::fs::create_dir_all(exploded.join("com/example")).unwrap();
        std::fs::write(exploded.join("com/example/Dir.class"), b"dir-bytes").unwrap();

        let jar = dir.path().join("dep.jar");
        let file = File::create(&jar).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(
                "com/example/Jarred.class",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(b"jar-bytes").unwrap();
        writer.finish().unwrap();

        let ctx = ClassLoaderContext::new("test".into(), vec![exploded, jar]);
        assert_eq!(ctx.find_class("com/example/Dir").unwrap(), b"dir-bytes");
        assert_eq!(ctx.find_class("com/example/Jarred").unwrap(), b"jar-bytes");
        assert!(ctx.find_class("com/example/Absent").is_none());
    }
}
