//! Group-by-sum over table columns.
//!
//! Shared by the combine step (per-side aggregation before the join) and
//! the summary tables (regrouping the joined result per dimension).

use std::collections::BTreeMap;

use crate::table::{Column, Dtype, Value};

/// The result of one group-by-sum pass.
pub(crate) struct GroupSum {
    /// Key tuple → summed measure, in ascending key order.
    pub groups: BTreeMap<Vec<Value>, f64>,
    /// Dtype the sums should be rendered in.
    pub dtype: Dtype,
}

/// Sum the measure column per distinct key tuple.
///
/// Rows with a missing cell in any key column are dropped. Missing or
/// non-numeric measure cells contribute nothing to the sum but still keep
/// their group alive, so an all-missing group sums to zero rather than
/// disappearing. The `BTreeMap` fixes the row order of every table built
/// from the result: ascending by key tuple.
///
/// All columns must come from the same table; lengths agree by
/// construction.
pub(crate) fn group_sum(keys: &[&Column], measure: &Column) -> GroupSum {
    let dtype = match measure.dtype {
        Dtype::Int => Dtype::Int,
        _ => Dtype::Float,
    };
    let mut groups: BTreeMap<Vec<Value>, f64> = BTreeMap::new();
    for row in 0..measure.values.len() {
        if keys.iter().any(|k| k.values[row].is_missing()) {
            continue;
        }
        let key: Vec<Value> = keys.iter().map(|k| k.values[row].clone()).collect();
        let entry = groups.entry(key).or_insert(0.0);
        if let Some(v) = measure.values[row].as_f64() {
            *entry += v;
        }
    }
    GroupSum { groups, dtype }
}

/// Render a sum in the dtype of its source column, so counts stay counts.
pub(crate) fn measure_value(sum: f64, dtype: Dtype) -> Value {
    match dtype {
        Dtype::Int => Value::Int(sum as i64),
        _ => Value::Float(sum),
    }
}
