//! Column-oriented in-memory tables.
//!
//! A [`RawTable`] is an ordered collection of named, typed columns of equal
//! length. Tables are immutable value objects: every transformation in this
//! crate (filter, group, join) builds a new table instead of mutating its
//! input, and sessions share loaded tables behind `Arc`.
//!
//! Cells are [`Value`]s: a dynamically-typed scalar with a total order and a
//! hash, so values can key `BTreeMap`/`BTreeSet` for grouping and
//! distinct-value listings.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{TableError, TableResult};

// =============================================================================
// Value - a single cell
// =============================================================================

/// A single cell value.
///
/// `Missing` is a cell-level state, orthogonal to the column's [`Dtype`]:
/// an `Int` column may still contain `Missing` cells where the source file
/// had empty fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

// Manual Eq/Ord/Hash so values can key BTreeMap/BTreeSet. Floats compare by
// `total_cmp` and hash by bit pattern; the loader never produces non-finite
// floats, so the NaN corner of `total_cmp` is unreachable from file input.

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Missing => 0,
                Int(_) => 1,
                Float(_) => 2,
                Text(_) => 3,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Missing, Missing) => std::cmp::Ordering::Equal,
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Missing => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Missing => Ok(()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Missing => serializer.serialize_none(),
        }
    }
}

impl Value {
    /// Interpret the value as an `f64` for summation and ratios.
    ///
    /// `Text` and `Missing` yield `None` and are skipped by aggregation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this cell is missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// JSON rendition of the cell (`Missing` becomes `null`).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Missing => serde_json::Value::Null,
        }
    }
}

// =============================================================================
// Dtype - the type of a column
// =============================================================================

/// Column type, determined once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int,
    Float,
    #[serde(rename = "str")]
    Text,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Int => write!(f, "int"),
            Dtype::Float => write!(f, "float"),
            Dtype::Text => write!(f, "str"),
        }
    }
}

// =============================================================================
// Column
// =============================================================================

/// A named column of values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub dtype: Dtype,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: Dtype, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }
}

// =============================================================================
// ColumnInfo - schema listing entry
// =============================================================================

/// One entry of a table's schema listing, shown to the user for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: Dtype,
}

// =============================================================================
// RawTable
// =============================================================================

/// An ordered collection of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTable {
    columns: Vec<Column>,
}

impl RawTable {
    /// Assemble a table, validating that all columns have the same length
    /// and no column name repeats.
    pub fn new(columns: Vec<Column>) -> TableResult<Self> {
        if let Some(first) = columns.first() {
            let expected = first.values.len();
            for col in &columns {
                if col.values.len() != expected {
                    return Err(TableError::LengthMismatch {
                        column: col.name.clone(),
                        expected,
                        actual: col.values.len(),
                    });
                }
            }
            let mut seen = std::collections::BTreeSet::new();
            for col in &columns {
                if !seen.insert(col.name.as_str()) {
                    return Err(TableError::DuplicateColumn(col.name.clone()));
                }
            }
        }
        Ok(Self { columns })
    }

    /// An empty table with no columns and no rows.
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// All columns, in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names, in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Name/type listing for user inspection.
    pub fn schema(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                dtype: c.dtype,
            })
            .collect()
    }

    /// The first `n` rows, as a new table.
    pub fn head(&self, n: usize) -> RawTable {
        let take = n.min(self.n_rows());
        RawTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    dtype: c.dtype,
                    values: c.values[..take].to_vec(),
                })
                .collect(),
        }
    }

    /// A new table with only the given rows, in the given order.
    ///
    /// Out-of-range indices are ignored.
    pub fn select_rows(&self, rows: &[usize]) -> RawTable {
        let n = self.n_rows();
        let rows: Vec<usize> = rows.iter().copied().filter(|&r| r < n).collect();
        RawTable {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    dtype: c.dtype,
                    values: rows.iter().map(|&r| c.values[r].clone()).collect(),
                })
                .collect(),
        }
    }

    /// Records-oriented JSON rendition: one object per row, keyed by column
    /// name, missing cells as `null`. This is the handoff format for
    /// presentation layers.
    pub fn to_records(&self) -> Vec<serde_json::Value> {
        (0..self.n_rows())
            .map(|row| {
                let mut obj = serde_json::Map::with_capacity(self.columns.len());
                for col in &self.columns {
                    obj.insert(col.name.clone(), col.values[row].to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}
