//! Error types for the doorstroom combination pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`TableError`] - invalid table construction
//! - [`LoadError`] - CSV loading errors
//! - [`CombineError`] - join & aggregation errors
//! - [`SessionError`] - top-level session errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! Every variant carries a message written for the end user: all failures
//! here are data or configuration problems. Retrying never helps; fixing
//! the input file or the mapping does.

use thiserror::Error;

use crate::mapping::Side;

// =============================================================================
// Table Construction Errors
// =============================================================================

/// Errors while assembling a table from columns.
#[derive(Debug, Error)]
pub enum TableError {
    /// Columns of unequal length.
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Two columns with the same name.
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
}

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while loading a delimited text file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read the file.
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The file has no content at all.
    #[error("file is empty")]
    EmptyFile,

    /// Every (encoding, delimiter) combination was rejected.
    #[error(
        "file could not be parsed with any of the {tried} tried \
         encoding/delimiter combinations; convert it to a regular CSV \
         (utf-8, comma or semicolon) and try again"
    )]
    NoViableFormat { tried: usize },

    /// The parsed rows did not form a valid table.
    #[error("invalid table structure: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Combine Errors
// =============================================================================

/// Errors from the join & aggregation engine.
///
/// Every variant means "cannot combine with the current mappings and
/// join-key selection"; the caller prompts the user to fix the mapping
/// rather than treating this as fatal.
#[derive(Debug, Error)]
pub enum CombineError {
    /// The metric label for a side has no column assigned.
    #[error("metric label '{label}' is not mapped on the {side} side")]
    MetricUnmapped { side: Side, label: &'static str },

    /// The metric label is mapped to a column the table does not have.
    #[error("mapped metric column '{column}' does not exist in the {side} table")]
    MetricMissing { side: Side, column: String },

    /// No join label resolved to a usable column.
    #[error("no usable join columns; map the chosen join labels in both datasets")]
    NoJoinKeys,

    /// The two sides resolved a different number of join columns.
    #[error(
        "join-key mismatch: {teller} resolved join column(s) on the teller side, \
         {noemer} on the noemer side; map the same join labels in both datasets"
    )]
    KeyCountMismatch { teller: usize, noemer: usize },

    /// The joined rows did not form a valid table (duplicate join labels).
    #[error("invalid join result: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Session Errors (top-level)
// =============================================================================

/// Top-level errors surfaced by [`crate::session::Session`].
///
/// Wraps the lower-level errors and adds session-specific variants.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An operation needed a table that has not been loaded yet.
    #[error("no {0} table loaded; upload a {0} file first")]
    TableNotLoaded(Side),

    /// Load error.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// Combine error.
    #[error("combine error: {0}")]
    Combine(#[from] CombineError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table construction.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for combine operations.
pub type CombineResult<T> = Result<T, CombineError>;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
