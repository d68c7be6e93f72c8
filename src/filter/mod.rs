//! Categorical row filters over a [`RawTable`].
//!
//! [`distinct`] lists the selectable values of a column, [`apply`] keeps
//! the rows whose value is in the selection. An empty selection means "no
//! restriction", so untouched filter widgets leave the table alone, and a
//! column that has disappeared from the table is skipped rather than
//! treated as matching nothing.

use std::borrow::Cow;
use std::collections::BTreeSet;

use tracing::debug;

use crate::table::{RawTable, Value};

/// The distinct non-missing values of `column`, ascending.
///
/// Missing cells are not selectable: they are dropped here and, because a
/// selection never contains them, filtered out by [`apply`] as soon as any
/// selection is made. An absent column has no values.
pub fn distinct(table: &RawTable, column: &str) -> Vec<Value> {
    let Some(column) = table.column(column) else {
        return Vec::new();
    };
    let unique: BTreeSet<&Value> = column
        .values
        .iter()
        .filter(|v| !v.is_missing())
        .collect();
    unique.into_iter().cloned().collect()
}

/// Keep the rows whose `column` value is one of `allowed`.
///
/// Borrows the input untouched when the selection is empty or the column
/// is absent; only a real restriction clones rows.
pub fn apply<'a>(table: &'a RawTable, column: &str, allowed: &[Value]) -> Cow<'a, RawTable> {
    if allowed.is_empty() {
        return Cow::Borrowed(table);
    }
    let Some(target) = table.column(column) else {
        debug!(column, "filter column absent, leaving table unchanged");
        return Cow::Borrowed(table);
    };

    let wanted: BTreeSet<&Value> = allowed.iter().collect();
    let keep: Vec<usize> = target
        .values
        .iter()
        .enumerate()
        .filter(|(_, v)| wanted.contains(v))
        .map(|(i, _)| i)
        .collect();
    debug!(column, kept = keep.len(), of = table.n_rows(), "applied filter");

    Cow::Owned(table.select_rows(&keep))
}
