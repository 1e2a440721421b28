//! Entity filter
//!
//! Turns per-column selections into a predicate: OR within a column, AND
//! across columns. Columns without a selection impose no constraint, so an
//! empty filter matches every row.
//!
//! The SQL form binds the selected values as parameters; only column names
//! (which come from configuration) are ever written into query text.

use std::fmt;

/// Selected values for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub column: String,
    pub values: Vec<String>,
}

/// SQL predicate with its bound parameters, numbered from the caller's offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlPredicate {
    pub text: String,
    pub params: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    selections: Vec<Selection>,
}

impl EntityFilter {
    /// Build a filter from `(column, values)` pairs in column order.
    /// Blank values are dropped, duplicates collapse, and columns left with
    /// no values are skipped.
    pub fn build<I>(selections: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let selections = selections
            .into_iter()
            .filter_map(|(column, values)| {
                let mut kept: Vec<String> = Vec::new();
                for value in values {
                    if !value.is_empty() && !kept.contains(&value) {
                        kept.push(value);
                    }
                }
                (!kept.is_empty()).then_some(Selection {
                    column,
                    values: kept,
                })
            })
            .collect();
        Self { selections }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// Evaluate the predicate against a row, given a lookup of the row's
    /// value per column. A missing column reads as the empty string.
    pub fn matches<'a, F>(&self, value_of: F) -> bool
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        self.selections.iter().all(|sel| {
            let value = value_of(&sel.column).unwrap_or("");
            sel.values.iter().any(|v| v == value)
        })
    }

    /// Render as a bound-parameter SQL predicate. Placeholders start at
    /// `$first_param`. Returns `None` for the empty filter.
    pub fn to_sql(&self, first_param: usize) -> Option<SqlPredicate> {
        if self.selections.is_empty() {
            return None;
        }
        let clauses: Vec<String> = self
            .selections
            .iter()
            .enumerate()
            .map(|(i, sel)| format!("{} = ANY(${})", sel.column, first_param + i))
            .collect();
        Some(SqlPredicate {
            text: format!("({})", clauses.join(" AND ")),
            params: self.selections.iter().map(|s| s.values.clone()).collect(),
        })
    }
}

/// Human-readable form returned to clients as `entityFilter`, e.g.
/// `((frontend = 'a' OR frontend = 'b') AND (solver = 'c'))`.
impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.selections.is_empty() {
            return Ok(());
        }
        let groups: Vec<String> = self
            .selections
            .iter()
            .map(|sel| {
                let terms: Vec<String> = sel
                    .values
                    .iter()
                    .map(|v| format!("{} = '{}'", sel.column, v.replace('\'', "''")))
                    .collect();
                format!("({})", terms.join(" OR "))
            })
            .collect();
        write!(f, "({})", groups.join(" AND "))
    }
}
