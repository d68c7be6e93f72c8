//! Functional labels and column mapping.
//!
//! Input files carry arbitrary column names; all semantics are established
//! by mapping columns onto a fixed vocabulary of *functional labels*
//! (`jaar`, `sector_mbo`, `aantal_ho_instromers`, ...). Each dataset side
//! (teller / noemer) has its own label catalog and its own [`LabelMapping`].
//!
//! [`suggest`] proposes a default column for a label with an ordered list of
//! keyword rules, scanned column-major: the first column (in table order)
//! for which any rule fires wins, so ties break on column order, not on
//! match quality.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::table::RawTable;

// =============================================================================
// Label Vocabulary
// =============================================================================

/// A functional label with its user-facing description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelSpec {
    pub label: &'static str,
    pub description: &'static str,
}

/// Labels for the teller side (ho entrants by mbo origin).
pub const TELLER_LABELS: &[LabelSpec] = &[
    LabelSpec {
        label: "jaar",
        description: "Jaar van ho-instroom (cohort / peiljaar)",
    },
    LabelSpec {
        label: "instelling_mbo",
        description: "Herkomstinstelling mbo (indien aanwezig, bijv. BRIN mbo)",
    },
    LabelSpec {
        label: "instelling_ho",
        description: "Ho-instelling (bestemming)",
    },
    LabelSpec {
        label: "sector_mbo",
        description: "Sector/sectorkamer/domein van de mbo-herkomstopleiding",
    },
    LabelSpec {
        label: "sector_ho",
        description: "Sector/domein van ho-opleiding (indien aanwezig)",
    },
    LabelSpec {
        label: "regio_mbo",
        description: "Regio van mbo-instelling (of woonregio student)",
    },
    LabelSpec {
        label: "regio_ho",
        description: "Regio van ho-instelling",
    },
    LabelSpec {
        label: "niveau_mbo",
        description: "Mbo-niveau (bijv. 2, 3, 4)",
    },
    LabelSpec {
        label: "aantal_ho_instromers",
        description: "Aantal ho-instroom (doorstromers, teller)",
    },
];

/// Labels for the noemer side (mbo graduates).
pub const NOEMER_LABELS: &[LabelSpec] = &[
    LabelSpec {
        label: "jaar",
        description: "Jaar van diplomering mbo (cohort)",
    },
    LabelSpec {
        label: "instelling_mbo",
        description: "Mbo-instelling (BRIN of intern instellings-ID)",
    },
    LabelSpec {
        label: "sector_mbo",
        description: "Sector/sectorkamer/domein mbo",
    },
    LabelSpec {
        label: "regio_mbo",
        description: "Regio van mbo-instelling",
    },
    LabelSpec {
        label: "niveau_mbo",
        description: "Mbo-niveau (bijv. 2, 3, 4)",
    },
    LabelSpec {
        label: "aantal_mbo_gediplomeerden",
        description: "Aantal mbo-gediplomeerden (noemer)",
    },
];

/// Metric label on the teller side.
pub const TELLER_METRIC: &str = "aantal_ho_instromers";

/// Metric label on the noemer side.
pub const NOEMER_METRIC: &str = "aantal_mbo_gediplomeerden";

/// Labels that may key the join between the two sides.
pub const JOIN_LABELS: &[&str] = &[
    "jaar",
    "instelling_mbo",
    "sector_mbo",
    "regio_mbo",
    "niveau_mbo",
];

/// Join-key selection a fresh session starts with.
pub const DEFAULT_JOIN_LABELS: &[&str] = &["jaar", "sector_mbo", "niveau_mbo"];

// =============================================================================
// Side
// =============================================================================

/// Which of the two datasets a mapping or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Teller,
    Noemer,
}

impl Side {
    /// The label catalog for this side.
    pub fn labels(self) -> &'static [LabelSpec] {
        match self {
            Side::Teller => TELLER_LABELS,
            Side::Noemer => NOEMER_LABELS,
        }
    }

    /// The metric label whose column is summed for this side.
    pub fn metric_label(self) -> &'static str {
        match self {
            Side::Teller => TELLER_METRIC,
            Side::Noemer => NOEMER_METRIC,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Teller => write!(f, "teller"),
            Side::Noemer => write!(f, "noemer"),
        }
    }
}

// =============================================================================
// Suggestion Rules
// =============================================================================

/// One suggestion rule: does `column` look like a match for `label`?
/// Both arguments arrive lowercased.
type Rule = fn(label: &str, column: &str) -> bool;

fn label_in_column(label: &str, column: &str) -> bool {
    column.contains(label)
}

fn jaar_keywords(label: &str, column: &str) -> bool {
    label == "jaar" && (column.contains("jaar") || column.contains("peil"))
}

fn instelling_keywords(label: &str, column: &str) -> bool {
    label.ends_with("_instelling") && column.contains("brin")
}

fn sector_keywords(label: &str, column: &str) -> bool {
    label.ends_with("_sector")
        && (column.contains("sector")
            || column.contains("sectorkamer")
            || column.contains("domein"))
}

fn regio_keywords(label: &str, column: &str) -> bool {
    label.ends_with("_regio") && column.contains("regio")
}

fn aantal_keywords(label: &str, column: &str) -> bool {
    label.starts_with("aantal")
        && (column.contains("aantal") || column.contains("stud") || column.contains("count"))
}

/// Rule evaluation order. Kept fixed: changing the order changes which
/// column wins a tie within one column's evaluation.
const SUGGEST_RULES: &[Rule] = &[
    label_in_column,
    jaar_keywords,
    instelling_keywords,
    sector_keywords,
    regio_keywords,
    aantal_keywords,
];

/// Propose a column for a functional label.
///
/// Scans `columns` in order; the first column for which any rule fires is
/// returned. Pure and infallible: no match simply yields `None`.
pub fn suggest<'a, S: AsRef<str>>(label: &str, columns: &'a [S]) -> Option<&'a str> {
    let label = label.to_lowercase();
    for column in columns {
        let lowered = column.as_ref().to_lowercase();
        if SUGGEST_RULES.iter().any(|rule| rule(&label, &lowered)) {
            return Some(column.as_ref());
        }
    }
    None
}

// =============================================================================
// LabelMapping
// =============================================================================

/// The label → column assignments for one dataset side.
///
/// Three states per label: never touched (absent), explicitly cleared
/// (present, `None`), or assigned (present, `Some`). The distinction
/// matters for [`LabelMapping::suggest_defaults`]: a label the user
/// explicitly cleared is never re-suggested, while an untouched label is
/// filled in when a table is loaded. No uniqueness is enforced; several
/// labels may point at the same column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMapping {
    assignments: BTreeMap<String, Option<String>>,
}

impl LabelMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user's choice for a label. `None` (or an empty column name)
    /// clears the label.
    pub fn assign(&mut self, label: &str, column: Option<&str>) {
        let value = match column {
            Some(c) if !c.is_empty() => Some(c.to_string()),
            _ => None,
        };
        self.assignments.insert(label.to_string(), value);
    }

    /// The column currently assigned to a label, if any.
    pub fn column_for(&self, label: &str) -> Option<&str> {
        match self.assignments.get(label) {
            Some(Some(column)) => Some(column.as_str()),
            _ => None,
        }
    }

    /// Whether the label is assigned to a column.
    pub fn is_set(&self, label: &str) -> bool {
        self.column_for(label).is_some()
    }

    /// The assigned column, but only when the table actually has it.
    /// A stale assignment (column gone after a re-upload) resolves to `None`.
    pub fn resolve<'a>(&'a self, label: &str, table: &RawTable) -> Option<&'a str> {
        match self.column_for(label) {
            Some(column) if table.has_column(column) => Some(column),
            _ => None,
        }
    }

    /// Fill every untouched catalog label with the suggester's proposal for
    /// this table. Labels the user already assigned or cleared keep their
    /// state; the suggestion outcome (even "no match") is recorded so a
    /// later upload does not overwrite it.
    pub fn suggest_defaults(&mut self, catalog: &[LabelSpec], table: &RawTable) {
        let columns = table.column_names();
        for spec in catalog {
            self.assignments
                .entry(spec.label.to_string())
                .or_insert_with(|| suggest(spec.label, &columns).map(str::to_string));
        }
    }

    /// All recorded assignments (cleared labels included, as `None`).
    pub fn assignments(&self) -> &BTreeMap<String, Option<String>> {
        &self.assignments
    }
}
