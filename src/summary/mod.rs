//! Summary views over a combined progression table.
//!
//! All functions here read the canonical measure columns
//! ([`TELLER_COLUMN`], [`NOEMER_COLUMN`]) of a table produced by
//! [`combine`](crate::engine::combine), or a filtered copy of it, and
//! return `None` when the table does not carry the columns they need.
//!
//! Ratios are always recomputed from re-summed teller and noemer values.
//! Averaging the per-row `doorstroompercentage` would weight a group of 3
//! students the same as a group of 3000, so that column is never read here.

use serde::Serialize;
use tracing::debug;

use crate::engine::{
    group_sum, measure_value, percentage, NOEMER_COLUMN, PERCENTAGE_COLUMN, TELLER_COLUMN,
};
use crate::table::{Column, Dtype, RawTable, Value};

/// Table-wide sums of the two measures and their ratio.
///
/// `percentage` is `None` when the summed denominator is zero, which
/// includes the empty table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub teller: f64,
    pub noemer: f64,
    pub percentage: Option<f64>,
}

/// Sum both measures over all rows; `None` when either measure column is
/// absent. Missing cells do not contribute to a sum.
pub fn totals(table: &RawTable) -> Option<Totals> {
    let teller = column_sum(table, TELLER_COLUMN)?;
    let noemer = column_sum(table, NOEMER_COLUMN)?;
    let percentage = if noemer == 0.0 {
        None
    } else {
        Some(teller / noemer * 100.0)
    };
    Some(Totals {
        teller,
        noemer,
        percentage,
    })
}

/// Regroup the table by one key column and recompute the ratio per group.
///
/// Output columns: `[label, teller_doorstromers, noemer_gediplomeerden,
/// doorstroompercentage]`, ascending by group key. `None` when the label
/// column or a measure column is absent (or the label shadows one of
/// them).
pub fn summarize_by(table: &RawTable, label: &str) -> Option<RawTable> {
    let key = table.column(label)?;
    let teller = table.column(TELLER_COLUMN)?;
    let noemer = table.column(NOEMER_COLUMN)?;

    let teller_agg = group_sum(&[key], teller);
    let noemer_agg = group_sum(&[key], noemer);
    debug!(label, groups = teller_agg.groups.len(), "summarized by key");

    let mut keys = Vec::with_capacity(teller_agg.groups.len());
    let mut teller_sums = Vec::with_capacity(teller_agg.groups.len());
    let mut noemer_sums = Vec::with_capacity(teller_agg.groups.len());
    let mut percentages = Vec::with_capacity(teller_agg.groups.len());
    for (group, teller_sum) in &teller_agg.groups {
        // Same rows, same key column: the noemer aggregation has exactly
        // the same groups.
        let noemer_sum = noemer_agg.groups.get(group).copied().unwrap_or(0.0);
        keys.push(group[0].clone());
        teller_sums.push(measure_value(*teller_sum, teller_agg.dtype));
        noemer_sums.push(measure_value(noemer_sum, noemer_agg.dtype));
        percentages.push(percentage(*teller_sum, noemer_sum));
    }

    RawTable::new(vec![
        Column::new(label, key.dtype, keys),
        Column::new(TELLER_COLUMN, teller_agg.dtype, teller_sums),
        Column::new(NOEMER_COLUMN, noemer_agg.dtype, noemer_sums),
        Column::new(PERCENTAGE_COLUMN, Dtype::Float, percentages),
    ])
    .ok()
}

/// Numerator flows from one category to another, e.g. mbo region to ho
/// region: `[from, to, teller_doorstromers]`, ascending by (from, to).
///
/// Only the numerator moves between categories, so the denominator and the
/// ratio make no sense here and are left out.
pub fn flow_between(table: &RawTable, from: &str, to: &str) -> Option<RawTable> {
    let from_col = table.column(from)?;
    let to_col = table.column(to)?;
    let teller = table.column(TELLER_COLUMN)?;

    let agg = group_sum(&[from_col, to_col], teller);
    debug!(from, to, flows = agg.groups.len(), "computed flow matrix");

    let mut from_values = Vec::with_capacity(agg.groups.len());
    let mut to_values = Vec::with_capacity(agg.groups.len());
    let mut sums = Vec::with_capacity(agg.groups.len());
    for (group, sum) in &agg.groups {
        from_values.push(group[0].clone());
        to_values.push(group[1].clone());
        sums.push(measure_value(*sum, agg.dtype));
    }

    RawTable::new(vec![
        Column::new(from, from_col.dtype, from_values),
        Column::new(to, to_col.dtype, to_values),
        Column::new(TELLER_COLUMN, agg.dtype, sums),
    ])
    .ok()
}

/// Display form of a ratio: one decimal plus a percent sign, or a fixed
/// phrase when the ratio could not be computed.
pub fn format_percentage(percentage: Option<f64>) -> String {
    match percentage {
        Some(p) => format!("{p:.1}%"),
        None => "not computable".to_string(),
    }
}

fn column_sum(table: &RawTable, name: &str) -> Option<f64> {
    let column = table.column(name)?;
    Some(column.values.iter().filter_map(Value::as_f64).sum())
}
