//! Workspace symbol index and dependency cache for a Groovy language server.
//!
//! The crate discovers sources and build-tool dependencies under a
//! workspace root, extracts declared symbols, persists them in an embedded
//! LMDB store under `<root>/.groovy-lsp/index/`, serves prefix queries and
//! keeps itself consistent as files and build descriptors change. Other
//! subsystems observe progress through the typed [`events::EventBus`].

pub mod config;
pub mod deps;
pub mod error;
pub mod events;
pub mod indexing;
pub mod jar;
pub mod logging;
pub mod memory;
pub mod parsing;
pub mod store;
pub mod symbol;
pub mod types;

pub use config::Settings;
pub use deps::{CacheStatistics, DependencyCache, DependencyResolver};
pub use error::{IndexError, IndexResult, StoreError};
pub use events::{EventBus, FileIndexedEvent, WorkspaceIndexedEvent};
pub use indexing::{WorkspaceIndexService, WorkspaceIndexer};
pub use jar::JarIndexer;
pub use memory::MemoryMonitor;
pub use parsing::ParserBridge;
pub use store::SymbolStore;
pub use symbol::SymbolInfo;
pub use types::SymbolKind;
