//! The join & aggregation engine.
//!
//! [`combine`] turns the two raw datasets into one progression-rate table:
//!
//! 1. resolve the metric column of each side via its mapping (fail when
//!    unset or absent);
//! 2. resolve the chosen join labels to columns, per side, skipping labels
//!    a side has not mapped (or whose column is gone);
//! 3. fail when the teller side resolved nothing, or the two sides
//!    resolved a different number of columns;
//! 4. group-by-sum each side over its resolved key columns;
//! 5. publish the key columns under canonical label names: the join-label
//!    selection zipped position-for-position against each side's resolved
//!    columns. Only the counts are checked: if the two sides resolved
//!    *different* labels, or an early label failed to resolve, keys pair up
//!    positionally under the wrong name. Known caveat, kept as is;
//! 6. inner-join the two aggregates: only key combinations present on both
//!    sides survive, so a gap on either side is surfaced instead of being
//!    read as zero;
//! 7. derive `doorstroompercentage` = 100 × teller / noemer, missing when
//!    the denominator is zero.
//!
//! The output row order is ascending by key tuple; identical inputs give
//! an identical [`JoinedTable`].

mod aggregate;

pub(crate) use aggregate::{group_sum, measure_value};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{CombineError, CombineResult};
use crate::mapping::{LabelMapping, Side};
use crate::table::{Column, Dtype, RawTable, Value};

// =============================================================================
// Output Column Names
// =============================================================================

/// Summed numerator column in every combined or summarized table.
pub const TELLER_COLUMN: &str = "teller_doorstromers";

/// Summed denominator column.
pub const NOEMER_COLUMN: &str = "noemer_gediplomeerden";

/// Derived ratio column.
pub const PERCENTAGE_COLUMN: &str = "doorstroompercentage";

// =============================================================================
// JoinedTable
// =============================================================================

/// The combined result: canonical key columns plus the two measure columns
/// and the derived percentage.
///
/// An empty row set is a valid result (no key combination occurred on both
/// sides), distinct from the [`CombineError`] failures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedTable {
    key_labels: Vec<String>,
    table: RawTable,
}

impl JoinedTable {
    /// The canonical key column names, in selection order.
    pub fn key_labels(&self) -> &[String] {
        &self.key_labels
    }

    /// The combined table: key columns, `teller_doorstromers`,
    /// `noemer_gediplomeerden`, `doorstroompercentage`.
    pub fn table(&self) -> &RawTable {
        &self.table
    }

    /// Unwrap into the underlying table, e.g. to filter it.
    pub fn into_table(self) -> RawTable {
        self.table
    }

    pub fn n_rows(&self) -> usize {
        self.table.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// =============================================================================
// Combine
// =============================================================================

/// Combine the teller and noemer datasets into one progression-rate table.
///
/// Every `Err` means "cannot combine with the current mappings and join-key
/// selection" and is recoverable by fixing the mapping; an empty join is
/// `Ok`.
pub fn combine(
    teller: &RawTable,
    noemer: &RawTable,
    teller_mapping: &LabelMapping,
    noemer_mapping: &LabelMapping,
    join_labels: &[String],
) -> CombineResult<JoinedTable> {
    let teller_metric = resolve_metric(teller, teller_mapping, Side::Teller)?;
    let noemer_metric = resolve_metric(noemer, noemer_mapping, Side::Noemer)?;

    let teller_keys = resolve_keys(teller, teller_mapping, join_labels);
    let noemer_keys = resolve_keys(noemer, noemer_mapping, join_labels);

    debug!(
        teller_keys = ?column_names(&teller_keys),
        noemer_keys = ?column_names(&noemer_keys),
        "resolved join columns"
    );

    if teller_keys.is_empty() {
        return Err(CombineError::NoJoinKeys);
    }
    if teller_keys.len() != noemer_keys.len() {
        return Err(CombineError::KeyCountMismatch {
            teller: teller_keys.len(),
            noemer: noemer_keys.len(),
        });
    }

    // Canonical names: the first k selected labels, k = resolved count.
    let canonical: Vec<String> = join_labels.iter().take(teller_keys.len()).cloned().collect();

    let teller_agg = group_sum(&teller_keys, teller_metric);
    let noemer_agg = group_sum(&noemer_keys, noemer_metric);
    debug!(
        teller_groups = teller_agg.groups.len(),
        noemer_groups = noemer_agg.groups.len(),
        "aggregated both sides"
    );

    let key_dtypes: Vec<Dtype> = teller_keys.iter().map(|c| c.dtype).collect();
    let mut key_values: Vec<Vec<Value>> = vec![Vec::new(); canonical.len()];
    let mut teller_sums = Vec::new();
    let mut noemer_sums = Vec::new();
    let mut percentages = Vec::new();

    for (key, teller_sum) in &teller_agg.groups {
        let Some(noemer_sum) = noemer_agg.groups.get(key) else {
            continue;
        };
        for (slot, cell) in key_values.iter_mut().zip(key) {
            slot.push(cell.clone());
        }
        teller_sums.push(measure_value(*teller_sum, teller_agg.dtype));
        noemer_sums.push(measure_value(*noemer_sum, noemer_agg.dtype));
        percentages.push(percentage(*teller_sum, *noemer_sum));
    }

    let mut columns = Vec::with_capacity(canonical.len() + 3);
    for ((name, dtype), values) in canonical.iter().zip(&key_dtypes).zip(key_values) {
        columns.push(Column::new(name.clone(), *dtype, values));
    }
    columns.push(Column::new(TELLER_COLUMN, teller_agg.dtype, teller_sums));
    columns.push(Column::new(NOEMER_COLUMN, noemer_agg.dtype, noemer_sums));
    columns.push(Column::new(PERCENTAGE_COLUMN, Dtype::Float, percentages));

    let table = RawTable::new(columns)?;
    info!(rows = table.n_rows(), keys = ?canonical, "combined teller and noemer");

    Ok(JoinedTable {
        key_labels: canonical,
        table,
    })
}

/// Ratio cell for one key combination; a zero denominator is a missing
/// value, not infinity and not zero.
pub(crate) fn percentage(teller: f64, noemer: f64) -> Value {
    if noemer == 0.0 {
        Value::Missing
    } else {
        Value::Float(teller / noemer * 100.0)
    }
}

fn resolve_metric<'a>(
    table: &'a RawTable,
    mapping: &LabelMapping,
    side: Side,
) -> CombineResult<&'a Column> {
    let label = side.metric_label();
    let column = mapping
        .column_for(label)
        .ok_or(CombineError::MetricUnmapped { side, label })?;
    table
        .column(column)
        .ok_or_else(|| CombineError::MetricMissing {
            side,
            column: column.to_string(),
        })
}

fn resolve_keys<'a>(
    table: &'a RawTable,
    mapping: &LabelMapping,
    join_labels: &[String],
) -> Vec<&'a Column> {
    join_labels
        .iter()
        .filter_map(|label| {
            mapping
                .resolve(label, table)
                .and_then(|column| table.column(column))
        })
        .collect()
}

fn column_names<'a>(columns: &[&'a Column]) -> Vec<&'a str> {
    columns.iter().map(|c| c.name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<(&str, Dtype, Vec<Value>)>) -> RawTable {
        RawTable::new(
            columns
                .into_iter()
                .map(|(name, dtype, values)| Column::new(name, dtype, values))
                .collect(),
        )
        .unwrap()
    }

    fn mapping(pairs: &[(&str, &str)]) -> LabelMapping {
        let mut m = LabelMapping::new();
        for (label, column) in pairs {
            m.assign(label, Some(column));
        }
        m
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    fn texts(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::Text(v.to_string())).collect()
    }

    fn simple_teller() -> RawTable {
        table(vec![
            ("jaar", Dtype::Int, ints(&[2021])),
            ("sector", Dtype::Text, texts(&["Zorg"])),
            ("n_ho", Dtype::Int, ints(&[50])),
        ])
    }

    fn simple_noemer(sector: &str) -> RawTable {
        table(vec![
            ("jaar", Dtype::Int, ints(&[2021])),
            ("sector", Dtype::Text, texts(&[sector])),
            ("n_mbo", Dtype::Int, ints(&[200])),
        ])
    }

    fn teller_map() -> LabelMapping {
        mapping(&[
            ("jaar", "jaar"),
            ("sector_mbo", "sector"),
            ("aantal_ho_instromers", "n_ho"),
        ])
    }

    fn noemer_map() -> LabelMapping {
        mapping(&[
            ("jaar", "jaar"),
            ("sector_mbo", "sector"),
            ("aantal_mbo_gediplomeerden", "n_mbo"),
        ])
    }

    #[test]
    fn test_combine_basic_ratio() {
        let joined = combine(
            &simple_teller(),
            &simple_noemer("Zorg"),
            &teller_map(),
            &noemer_map(),
            &labels(&["jaar", "sector_mbo"]),
        )
        .unwrap();

        assert_eq!(joined.key_labels(), ["jaar", "sector_mbo"]);
        let t = joined.table();
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.column("jaar").unwrap().values, ints(&[2021]));
        assert_eq!(t.column("sector_mbo").unwrap().values, texts(&["Zorg"]));
        assert_eq!(t.column(TELLER_COLUMN).unwrap().values, ints(&[50]));
        assert_eq!(t.column(NOEMER_COLUMN).unwrap().values, ints(&[200]));
        assert_eq!(
            t.column(PERCENTAGE_COLUMN).unwrap().values,
            vec![Value::Float(25.0)]
        );
    }

    #[test]
    fn test_disjoint_keys_yield_empty_result_not_failure() {
        let joined = combine(
            &simple_teller(),
            &simple_noemer("Techniek"),
            &teller_map(),
            &noemer_map(),
            &labels(&["jaar", "sector_mbo"]),
        )
        .unwrap();
        assert!(joined.is_empty());
        assert_eq!(joined.table().n_columns(), 5);
    }

    #[test]
    fn test_unmapped_metric_fails() {
        let mut incomplete = noemer_map();
        incomplete.assign("aantal_mbo_gediplomeerden", None);
        let err = combine(
            &simple_teller(),
            &simple_noemer("Zorg"),
            &teller_map(),
            &incomplete,
            &labels(&["jaar"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CombineError::MetricUnmapped {
                side: Side::Noemer,
                ..
            }
        ));
    }

    #[test]
    fn test_metric_mapped_to_absent_column_fails() {
        let mut stale = teller_map();
        stale.assign("aantal_ho_instromers", Some("verdwenen"));
        let err = combine(
            &simple_teller(),
            &simple_noemer("Zorg"),
            &stale,
            &noemer_map(),
            &labels(&["jaar"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CombineError::MetricMissing { side: Side::Teller, ref column } if column == "verdwenen"
        ));
    }

    #[test]
    fn test_zero_denominator_row_survives_with_missing_percentage() {
        let noemer = table(vec![
            ("jaar", Dtype::Int, ints(&[2021])),
            ("sector", Dtype::Text, texts(&["Zorg"])),
            ("n_mbo", Dtype::Int, ints(&[0])),
        ]);
        let joined = combine(
            &simple_teller(),
            &noemer,
            &teller_map(),
            &noemer_map(),
            &labels(&["jaar", "sector_mbo"]),
        )
        .unwrap();
        let t = joined.table();
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.column(NOEMER_COLUMN).unwrap().values, ints(&[0]));
        assert_eq!(
            t.column(PERCENTAGE_COLUMN).unwrap().values,
            vec![Value::Missing]
        );
    }

    #[test]
    fn test_inner_join_drops_one_sided_years() {
        let teller = table(vec![
            ("jaar", Dtype::Int, ints(&[2020, 2021])),
            ("n_ho", Dtype::Int, ints(&[40, 50])),
        ]);
        let noemer = table(vec![
            ("jaar", Dtype::Int, ints(&[2021])),
            ("n_mbo", Dtype::Int, ints(&[100])),
        ]);
        let joined = combine(
            &teller,
            &noemer,
            &mapping(&[("jaar", "jaar"), ("aantal_ho_instromers", "n_ho")]),
            &mapping(&[("jaar", "jaar"), ("aantal_mbo_gediplomeerden", "n_mbo")]),
            &labels(&["jaar"]),
        )
        .unwrap();
        let t = joined.table();
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.column("jaar").unwrap().values, ints(&[2021]));
        assert_eq!(
            t.column(PERCENTAGE_COLUMN).unwrap().values,
            vec![Value::Float(50.0)]
        );
    }

    #[test]
    fn test_rows_are_summed_per_key_before_the_join() {
        let teller = table(vec![
            ("jaar", Dtype::Int, ints(&[2021, 2021, 2022])),
            ("n_ho", Dtype::Int, ints(&[30, 20, 7])),
        ]);
        let noemer = table(vec![
            ("jaar", Dtype::Int, ints(&[2022, 2021])),
            ("n_mbo", Dtype::Int, ints(&[70, 100])),
        ]);
        let joined = combine(
            &teller,
            &noemer,
            &mapping(&[("jaar", "jaar"), ("aantal_ho_instromers", "n_ho")]),
            &mapping(&[("jaar", "jaar"), ("aantal_mbo_gediplomeerden", "n_mbo")]),
            &labels(&["jaar"]),
        )
        .unwrap();
        let t = joined.table();
        // Ascending key order regardless of input order.
        assert_eq!(t.column("jaar").unwrap().values, ints(&[2021, 2022]));
        assert_eq!(t.column(TELLER_COLUMN).unwrap().values, ints(&[50, 7]));
        assert_eq!(t.column(NOEMER_COLUMN).unwrap().values, ints(&[100, 70]));
        assert_eq!(
            t.column(PERCENTAGE_COLUMN).unwrap().values,
            vec![Value::Float(50.0), Value::Float(10.0)]
        );
    }

    #[test]
    fn test_key_count_mismatch_fails() {
        let mut noemer_jaar_only = noemer_map();
        noemer_jaar_only.assign("sector_mbo", None);
        let err = combine(
            &simple_teller(),
            &simple_noemer("Zorg"),
            &teller_map(),
            &noemer_jaar_only,
            &labels(&["jaar", "sector_mbo"]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CombineError::KeyCountMismatch {
                teller: 2,
                noemer: 1
            }
        ));
    }

    #[test]
    fn test_no_resolved_keys_fails() {
        let err = combine(
            &simple_teller(),
            &simple_noemer("Zorg"),
            &mapping(&[("aantal_ho_instromers", "n_ho")]),
            &mapping(&[("aantal_mbo_gediplomeerden", "n_mbo")]),
            &labels(&["jaar"]),
        )
        .unwrap_err();
        assert!(matches!(err, CombineError::NoJoinKeys));
    }

    #[test]
    fn test_positional_key_pairing_is_count_checked_only() {
        // Teller resolves only sector_mbo, noemer only jaar: one column
        // each, so the count check passes and the pair is published under
        // the first selected label. The join then compares sectors against
        // years and finds nothing.
        let joined = combine(
            &simple_teller(),
            &simple_noemer("Zorg"),
            &mapping(&[
                ("sector_mbo", "sector"),
                ("aantal_ho_instromers", "n_ho"),
            ]),
            &mapping(&[("jaar", "jaar"), ("aantal_mbo_gediplomeerden", "n_mbo")]),
            &labels(&["jaar", "sector_mbo"]),
        )
        .unwrap();
        assert_eq!(joined.key_labels(), ["jaar"]);
        assert!(joined.is_empty());
    }

    #[test]
    fn test_missing_key_cells_fall_out_of_the_aggregation() {
        let teller = table(vec![
            ("jaar", Dtype::Int, vec![Value::Int(2021), Value::Missing]),
            ("n_ho", Dtype::Int, ints(&[50, 999])),
        ]);
        let joined = combine(
            &teller,
            &simple_noemer("Zorg"),
            &mapping(&[("jaar", "jaar"), ("aantal_ho_instromers", "n_ho")]),
            &mapping(&[("jaar", "jaar"), ("aantal_mbo_gediplomeerden", "n_mbo")]),
            &labels(&["jaar"]),
        )
        .unwrap();
        let t = joined.table();
        assert_eq!(t.n_rows(), 1);
        assert_eq!(t.column(TELLER_COLUMN).unwrap().values, ints(&[50]));
    }

    #[test]
    fn test_float_metric_keeps_float_dtype() {
        let teller = table(vec![
            ("jaar", Dtype::Int, ints(&[2021])),
            ("n_ho", Dtype::Float, vec![Value::Float(12.5)]),
        ]);
        let joined = combine(
            &teller,
            &simple_noemer("Zorg"),
            &mapping(&[("jaar", "jaar"), ("aantal_ho_instromers", "n_ho")]),
            &mapping(&[("jaar", "jaar"), ("aantal_mbo_gediplomeerden", "n_mbo")]),
            &labels(&["jaar"]),
        )
        .unwrap();
        let t = joined.table();
        assert_eq!(t.column(TELLER_COLUMN).unwrap().dtype, Dtype::Float);
        assert_eq!(
            t.column(TELLER_COLUMN).unwrap().values,
            vec![Value::Float(12.5)]
        );
    }

    #[test]
    fn test_combine_is_deterministic() {
        let run = || {
            combine(
                &simple_teller(),
                &simple_noemer("Zorg"),
                &teller_map(),
                &noemer_map(),
                &labels(&["jaar", "sector_mbo"]),
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }
}
