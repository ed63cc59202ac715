//! Parsing bridge: one source file in, a list of symbols out.
//!
//! The Groovy AST parser sits behind the [`GroovyParser`] seam so the
//! bridge can host any parser producing the declaration tree; the crate
//! ships [`DeclarationScanner`] as its implementation. Java files take the
//! regex path. All guards live here: oversized files, missing files and
//! parser failures all degrade to "indexed with zero symbols".

pub mod ast;
mod groovy;
mod java;
mod visitor;

pub use groovy::DeclarationScanner;
pub use java::JavaScanner;
pub use visitor::emit_symbols;

use crate::symbol::SymbolInfo;
use ast::ModuleNode;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Files above this size are not parsed at all.
pub const MAX_SOURCE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// The external parser seam: source text to declaration tree.
/// `None` denotes parse failure.
pub trait GroovyParser: Send + Sync {
    fn parse(&self, source: &str, file_name: &str) -> Option<ModuleNode>;
}

/// Source languages the bridge understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Groovy,
    Java,
}

impl Language {
    /// Detect by extension. Gradle build scripts are Groovy sources.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("groovy") | Some("gradle") => Some(Self::Groovy),
            Some("java") => Some(Self::Java),
            _ => None,
        }
    }
}

/// Result of parsing one file. `success` is false only when the parser
/// itself failed (or the content could not be read); guard-skipped files
/// still count as successfully indexed with zero symbols.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub symbols: Vec<SymbolInfo>,
    pub success: bool,
}

impl ParseOutcome {
    fn empty(success: bool) -> Self {
        Self {
            symbols: Vec::new(),
            success,
        }
    }

    fn ok(symbols: Vec<SymbolInfo>) -> Self {
        Self {
            symbols,
            success: true,
        }
    }
}

/// Turns one file's content into symbols, recovering from every
/// per-file fault.
pub struct ParserBridge {
    groovy: Arc<dyn GroovyParser>,
    java: JavaScanner,
}

impl Default for ParserBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserBridge {
    pub fn new() -> Self {
        Self::with_parser(Arc::new(DeclarationScanner::new()))
    }

    pub fn with_parser(parser: Arc<dyn GroovyParser>) -> Self {
        Self {
            groovy: parser,
            java: JavaScanner::new(),
        }
    }

    /// Parse one source file. A missing file, an oversized file or a parser
    /// failure yields an empty symbol list (the file still counts as
    /// indexed).
    pub fn parse_file(&self, path: &Path) -> ParseOutcome {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(_) => {
                warn!("file not found, indexing as empty: {}", path.display());
                return ParseOutcome::empty(true);
            }
        };
        if metadata.len() > MAX_SOURCE_FILE_SIZE {
            warn!(
                "file exceeds {} bytes, skipping parse: {}",
                MAX_SOURCE_FILE_SIZE,
                path.display()
            );
            return ParseOutcome::empty(true);
        }

        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(err) => {
                warn!("failed to read {}: {err}", path.display());
                return ParseOutcome::empty(false);
            }
        };

        self.parse_source(&source, path)
    }

    /// Parse already-loaded content, attributing symbols to `location`.
    pub fn parse_source(&self, source: &str, location: &Path) -> ParseOutcome {
        let file_name = location
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        match Language::from_path(location) {
            Some(Language::Java) => match self.java.scan(source, location) {
                Ok(symbols) => ParseOutcome::ok(symbols),
                Err(err) => {
                    warn!("java scan failed for {}: {err}", location.display());
                    ParseOutcome::empty(false)
                }
            },
            Some(Language::Groovy) => match self.groovy.parse(source, file_name) {
                Some(module) => {
                    let symbols = emit_symbols(&module, location);
                    debug!("{} symbols from {}", symbols.len(), location.display());
                    ParseOutcome::ok(symbols)
                }
                None => {
                    warn!("parse failure, indexing as empty: {}", location.display());
                    ParseOutcome::empty(false)
                }
            },
            None => ParseOutcome::empty(true),
        }
    }
}
