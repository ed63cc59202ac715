//! Error types for the workspace index.
//!
//! This module provides structured error types using thiserror, split by
//! subsystem the same way the faults are recovered: store faults propagate,
//! everything else is recovered at the nearest boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for indexing operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// A DTO constructor received an invalid argument. Programming fault,
    /// surfaced immediately and never persisted.
    #[error("invalid symbol: {reason}")]
    InvalidSymbol { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("indexing task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Errors specific to the symbol store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The environment cannot be opened. Fatal for the affected workspace.
    #[error("failed to open symbol store at '{path}': {source}")]
    InitFailed {
        path: PathBuf,
        #[source]
        source: heed::Error,
    },

    #[error("failed to create index directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An operation was attempted before `initialize` or after `close`.
    #[error("symbol store is not initialized")]
    NotInitialized,

    /// A transaction failed mid-flight. The previous snapshot is intact.
    #[error("symbol store I/O failed during {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: heed::Error,
    },

    /// A stored record could not be decoded back into a symbol.
    #[error("corrupt store record: {reason}")]
    Corrupt { reason: String },
}

/// Errors specific to dependency resolution. These never cross the resolver
/// boundary during indexing (the resolver degrades to an empty classpath),
/// but are exposed for callers that want the cause.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("build tool invocation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} exited with {code:?}:\n{stderr}")]
    CommandFailed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse {tool} output: {reason}")]
    Parse { tool: &'static str, reason: String },
}

/// Errors from the class-file decoder. Archive indexing recovers from
/// these per entry, keeping symbols already gathered.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("unexpected end of class file")]
    UnexpectedEof,

    #[error("invalid class file magic {0:#x}")]
    InvalidMagic(u32),

    #[error("invalid constant pool index {0}")]
    BadConstantIndex(u16),

    #[error("constant pool entry {0} has unexpected tag")]
    UnexpectedConstantTag(u16),

    #[error("invalid modified UTF-8 in constant pool")]
    InvalidUtf8,
}

/// Result type alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
