//! Per-user working state.
//!
//! A [`Session`] owns everything one user builds up while exploring a
//! dataset pair: the two loaded tables, the label mapping of each side and
//! the join-key selection. Sessions are plain values with no interior
//! mutability and nothing global behind them, so concurrent users are
//! concurrent `Session` values that cannot observe each other. Nothing is
//! persisted: dropping the session drops the uploads.
//!
//! Every mutation is cheap bookkeeping; [`Session::combine`] recomputes
//! the joined table from scratch so the result always reflects the current
//! mappings and join keys.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{self, JoinedTable};
use crate::error::{SessionError, SessionResult};
use crate::loader::{self, LoadedTable};
use crate::mapping::{LabelMapping, Side, DEFAULT_JOIN_LABELS, JOIN_LABELS};
use crate::table::ColumnInfo;

// =============================================================================
// Session
// =============================================================================

/// One user's mutable working state, from upload to combined table.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    teller: Option<Arc<LoadedTable>>,
    noemer: Option<Arc<LoadedTable>>,
    teller_mapping: LabelMapping,
    noemer_mapping: LabelMapping,
    join_labels: Vec<String>,
}

impl Session {
    /// A fresh session: no tables, no assignments, the default join-key
    /// selection.
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "session created");
        Self {
            id,
            created_at: Utc::now(),
            teller: None,
            noemer: None,
            teller_mapping: LabelMapping::new(),
            noemer_mapping: LabelMapping::new(),
            join_labels: DEFAULT_JOIN_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Load the numerator dataset and suggest columns for labels the user
    /// has not decided on yet.
    pub fn load_teller(&mut self, bytes: &[u8]) -> SessionResult<()> {
        self.load(Side::Teller, bytes)
    }

    /// Load the denominator dataset, with the same suggestion pass.
    pub fn load_noemer(&mut self, bytes: &[u8]) -> SessionResult<()> {
        self.load(Side::Noemer, bytes)
    }

    fn load(&mut self, side: Side, bytes: &[u8]) -> SessionResult<()> {
        let loaded = loader::load_bytes(bytes)?;
        info!(
            session = %self.id,
            %side,
            rows = loaded.table.n_rows(),
            encoding = loaded.encoding,
            delimiter = %loaded.delimiter,
            "table loaded into session"
        );
        let (slot, mapping) = match side {
            Side::Teller => (&mut self.teller, &mut self.teller_mapping),
            Side::Noemer => (&mut self.noemer, &mut self.noemer_mapping),
        };
        // Only labels without a recorded decision get a suggestion; earlier
        // explicit choices, including explicit "no column", stay put.
        mapping.suggest_defaults(side.labels(), &loaded.table);
        *slot = Some(Arc::new(loaded));
        Ok(())
    }

    /// The loaded dataset of one side, if any.
    pub fn table(&self, side: Side) -> Option<&LoadedTable> {
        match side {
            Side::Teller => self.teller.as_deref(),
            Side::Noemer => self.noemer.as_deref(),
        }
    }

    /// A shared handle to one side's dataset. The table behind it is
    /// immutable, so the handle stays valid while the session moves on.
    pub fn shared_table(&self, side: Side) -> Option<Arc<LoadedTable>> {
        match side {
            Side::Teller => self.teller.clone(),
            Side::Noemer => self.noemer.clone(),
        }
    }

    pub fn mapping(&self, side: Side) -> &LabelMapping {
        match side {
            Side::Teller => &self.teller_mapping,
            Side::Noemer => &self.noemer_mapping,
        }
    }

    /// Record the user's choice for a teller-side label; `None` means
    /// "this label has no column".
    pub fn assign_teller(&mut self, label: &str, column: Option<&str>) {
        debug!(session = %self.id, side = %Side::Teller, label, ?column, "mapping changed");
        self.teller_mapping.assign(label, column);
    }

    /// Noemer-side counterpart of [`assign_teller`](Self::assign_teller).
    pub fn assign_noemer(&mut self, label: &str, column: Option<&str>) {
        debug!(session = %self.id, side = %Side::Noemer, label, ?column, "mapping changed");
        self.noemer_mapping.assign(label, column);
    }

    pub fn join_labels(&self) -> &[String] {
        &self.join_labels
    }

    /// Replace the join-key selection. Labels outside the join vocabulary
    /// are dropped; order is preserved and repeats keep their first
    /// position.
    pub fn set_join_labels<S: AsRef<str>>(&mut self, labels: &[S]) {
        let mut selected: Vec<String> = Vec::new();
        for label in labels {
            let label = label.as_ref();
            if JOIN_LABELS.contains(&label) && !selected.iter().any(|s| s == label) {
                selected.push(label.to_string());
            }
        }
        debug!(session = %self.id, ?selected, "join-key selection changed");
        self.join_labels = selected;
    }

    /// Combine the two datasets under the current mappings and join keys.
    ///
    /// Recomputed from scratch on every call; nothing is cached between
    /// interactions.
    pub fn combine(&self) -> SessionResult<JoinedTable> {
        let teller = self
            .teller
            .as_deref()
            .ok_or(SessionError::TableNotLoaded(Side::Teller))?;
        let noemer = self
            .noemer
            .as_deref()
            .ok_or(SessionError::TableNotLoaded(Side::Noemer))?;
        match engine::combine(
            &teller.table,
            &noemer.table,
            &self.teller_mapping,
            &self.noemer_mapping,
            &self.join_labels,
        ) {
            Ok(joined) => Ok(joined),
            Err(err) => {
                warn!(session = %self.id, error = %err, "combine failed");
                Err(err.into())
            }
        }
    }

    /// Presentation-facing view of the session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            teller: self.teller.as_deref().map(overview),
            noemer: self.noemer.as_deref().map(overview),
            teller_mapping: self.teller_mapping.clone(),
            noemer_mapping: self.noemer_mapping.clone(),
            join_labels: self.join_labels.clone(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Snapshot DTOs
// =============================================================================

/// Serializable state of a [`Session`]: identity, per-side dataset
/// overviews, both mappings and the join-key selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub teller: Option<TableOverview>,
    pub noemer: Option<TableOverview>,
    pub teller_mapping: LabelMapping,
    pub noemer_mapping: LabelMapping,
    pub join_labels: Vec<String>,
}

/// What a user needs to see about one loaded dataset: shape, schema and
/// the detected file format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOverview {
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
    pub encoding: &'static str,
    pub delimiter: char,
}

fn overview(loaded: &LoadedTable) -> TableOverview {
    TableOverview {
        row_count: loaded.table.n_rows(),
        columns: loaded.table.schema(),
        encoding: loaded.encoding,
        delimiter: loaded.delimiter,
    }
}
