//! File system walker for discovering source files to index.
//!
//! Directory traversal honoring .gitignore rules and the configured ignore
//! patterns, filtered to the extensions the parser bridge understands.
//! Hidden directories (including the index's own `.groovy-lsp` state dir)
//! are never entered.

use crate::Settings;
use crate::parsing::Language;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Walks a workspace to find source files to index.
pub struct FileWalker {
    settings: Arc<Settings>,
}

impl FileWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Walk a directory and return an iterator of files to index.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> + use<> {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .max_depth(None)
            .require_git(false);

        let mut override_builder = ignore::overrides::OverrideBuilder::new(root);
        for pattern in &self.settings.indexing.ignore_patterns {
            // Overrides are whitelists; exclusion patterns are negated.
            if let Err(e) = override_builder.add(&format!("!{pattern}")) {
                warn!("invalid ignore pattern '{pattern}': {e}");
            }
        }
        if let Ok(overrides) = override_builder.build() {
            builder.overrides(overrides);
        }

        let include_java = self.settings.indexing.include_java;
        builder
            .build()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(move |entry| {
                let path = entry.path();
                match Language::from_path(path) {
                    Some(Language::Groovy) => Some(path.to_path_buf()),
                    Some(Language::Java) if include_java => Some(path.to_path_buf()),
                    _ => None,
                }
            })
    }

    /// Count files that would be indexed (useful for dry runs).
    pub fn count_files(&self, root: &Path) -> usize {
        self.walk(root).count()
    }
}
