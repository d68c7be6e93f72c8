//! # Doorstroom - mbo naar ho doorstroompercentages
//!
//! Doorstroom combines two CSV uploads, a numerator dataset (mbo graduates
//! entering higher education) and a denominator dataset (all mbo
//! graduates), into progression percentages per year, sector, level,
//! region or institution.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV bytes  │────▶│   Loader    │────▶│   Mapping   │────▶│   Combine   │
//! │ (enc + sep) │     │ (auto-det.) │     │ (lbl → col) │     │ (join, pct) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use doorstroom::Session;
//!
//! fn main() {
//!     let mut session = Session::new();
//!     session.load_teller(&std::fs::read("instroom.csv").unwrap()).unwrap();
//!     session.load_noemer(&std::fs::read("gediplomeerden.csv").unwrap()).unwrap();
//!     let joined = session.combine().unwrap();
//!     println!("{} rows combined", joined.n_rows());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`table`] - Columnar table model (values, dtypes, schema)
//! - [`loader`] - CSV loading with encoding and delimiter detection
//! - [`mapping`] - Label vocabulary, column suggestions, mapping state
//! - [`filter`] - Categorical row filters
//! - [`engine`] - Join & aggregation into percentages
//! - [`summary`] - Totals, per-dimension summaries, flow matrices
//! - [`session`] - Per-user working state

// Core modules
pub mod error;
pub mod table;

// Loading
pub mod loader;

// Mapping
pub mod mapping;

// Combining
pub mod engine;
pub mod filter;
pub mod summary;

// Session state
pub mod session;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CombineError,
    CombineResult,
    LoadError,
    LoadResult,
    SessionError,
    SessionResult,
    TableError,
    TableResult,
};

// =============================================================================
// Re-exports - Table model
// =============================================================================

pub use table::{Column, ColumnInfo, Dtype, RawTable, Value};

// =============================================================================
// Re-exports - Loader
// =============================================================================

pub use loader::{load_bytes, load_path, LoadedTable};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{
    suggest,
    LabelMapping,
    LabelSpec,
    Side,
    DEFAULT_JOIN_LABELS,
    JOIN_LABELS,
    NOEMER_LABELS,
    NOEMER_METRIC,
    TELLER_LABELS,
    TELLER_METRIC,
};

// =============================================================================
// Re-exports - Filtering
// =============================================================================

pub use filter::{apply as apply_filter, distinct as distinct_values};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use engine::{
    combine,
    JoinedTable,
    NOEMER_COLUMN,
    PERCENTAGE_COLUMN,
    TELLER_COLUMN,
};

// =============================================================================
// Re-exports - Summaries
// =============================================================================

pub use summary::{flow_between, format_percentage, summarize_by, totals, Totals};

// =============================================================================
// Re-exports - Session
// =============================================================================

pub use session::{Session, SessionSnapshot, TableOverview};
