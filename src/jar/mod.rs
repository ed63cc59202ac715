//! Symbol extraction from dependency archives.
//!
//! Walks a JAR's entries under three hard caps (entry count, single-entry
//! size, cumulative uncompressed size) and decodes each class file with the
//! skip-everything-but-names decoder. A malformed entry is skipped; symbols
//! from entries already processed are kept.

pub mod classfile;

use crate::symbol::SymbolInfo;
use crate::types::SymbolKind;
use classfile::{ACC_ENUM, ACC_INTERFACE, ClassSummary};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};
use zip::ZipArchive;

/// Hard cap on archive entries examined in one pass.
pub const MAX_JAR_ENTRIES: usize = 100_000;
/// Hard cap on a single entry's uncompressed size.
pub const MAX_ENTRY_SIZE: u64 = 50 * 1024 * 1024;
/// Hard cap on cumulative uncompressed bytes read from one archive.
pub const MAX_TOTAL_SIZE: u64 = 500 * 1024 * 1024;

/// Extracts symbols from compiled class files in dependency archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct JarIndexer;

impl JarIndexer {
    pub fn new() -> Self {
        Self
    }

    /// Index one archive. Never fails: an unreadable archive yields the
    /// symbols gathered so far (possibly none) and a warning.
    pub fn index_jar(&self, path: &Path) -> Vec<SymbolInfo> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(err) => {
                warn!("cannot open archive {}: {err}", path.display());
                return Vec::new();
            }
        };
        let mut archive = match ZipArchive::new(file) {
            Ok(a) => a,
            Err(err) => {
                warn!("cannot read archive {}: {err}", path.display());
                return Vec::new();
            }
        };

        let mut symbols = Vec::new();
        let mut total_bytes = 0u64;
        let entry_count = archive.len().min(MAX_JAR_ENTRIES);
        if archive.len() > MAX_JAR_ENTRIES {
            warn!(
                "archive {} has {} entries, scanning only the first {MAX_JAR_ENTRIES}",
                path.display(),
                archive.len()
            );
        }

        for index in 0..entry_count {
            let mut entry = match archive.by_index(index) {
                Ok(e) => e,
                Err(err) => {
                    warn!("unreadable entry {index} in {}: {err}", path.display());
                    continue;
                }
            };
            if entry.is_dir() || !entry.name().ends_with(".class") {
                continue;
            }
            if entry.size() > MAX_ENTRY_SIZE {
                warn!(
                    "entry {} exceeds {MAX_ENTRY_SIZE} bytes, skipped",
                    entry.name()
                );
                continue;
            }
            if total_bytes + entry.size() > MAX_TOTAL_SIZE {
                warn!(
                    "archive {} exceeds {MAX_TOTAL_SIZE} cumulative bytes, stopping early",
                    path.display()
                );
                break;
            }
            total_bytes += entry.size();

            let mut bytes = Vec::with_capacity(entry.size() as usize);
            if let Err(err) = entry.read_to_end(&mut bytes) {
                warn!("failed to read {}: {err}", entry.name());
                continue;
            }
            let location = format!("{}!/{}", path.display(), entry.name());
            match ClassSummary::parse(&bytes) {
                Ok(class) => emit_class_symbols(&class, &location, &mut symbols),
                Err(err) => {
                    warn!("malformed class {}: {err}", entry.name());
                }
            }
        }

        debug!("{} symbols from archive {}", symbols.len(), path.display());
        symbols
    }
}

fn emit_class_symbols(class: &ClassSummary, location: &str, symbols: &mut Vec<SymbolInfo>) {
    // Annotations keep their interface flag and are indexed as interfaces;
    // bytecode carries no separate kind for them.
    let kind = if class.access_flags & ACC_ENUM != 0 {
        SymbolKind::Enum
    } else if class.access_flags & ACC_INTERFACE != 0 {
        SymbolKind::Interface
    } else {
        SymbolKind::Class
    };

    let mut push = |name: String, kind: SymbolKind| {
        match SymbolInfo::new(name, kind, location, 1, 1) {
            Ok(symbol) => symbols.push(symbol),
            Err(err) => warn!("skipping invalid archive symbol: {err}"),
        }
    };

    push(class.name.clone(), kind);

    for field in &class.fields {
        push(format!("{}.{}", class.name, field.name), SymbolKind::Field);
    }
    for method in &class.methods {
        if method.is_synthetic() {
            continue;
        }
        let kind = if method.name == "<init>" {
            SymbolKind::Constructor
        } else {
            SymbolKind::Method
        };
        push(format!("{}.{}", class.name, method.name), kind);
    }
}
