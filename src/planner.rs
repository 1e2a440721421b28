//! Query planner
//!
//! Derives every query a request needs from the active columns:
//! one distinct-label query per column, and one pairwise volume query per
//! ordered column pair `(i, j)` with `i < j`. Distant pairs additionally
//! require every column strictly between `i` and `j` to be empty, so a flow
//! passing through an intermediate stage is only counted on the adjacent
//! pairs it actually traverses.
//!
//! Query text is whitespace-normalized at construction, so it can be used
//! directly as a cache key.

use serde::Serialize;

use crate::columns::{Column, VOLUME_COLUMN};
use crate::filter::EntityFilter;

/// Normalized query text plus its bound parameters (one text array per
/// selected column, in placeholder order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlQuery {
    pub text: String,
    pub params: Vec<Vec<String>>,
}

impl SqlQuery {
    pub fn new(text: &str, params: Vec<Vec<String>>) -> Self {
        Self {
            text: normalize_whitespace(text),
            params,
        }
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct labels observed in one column.
#[derive(Debug, Clone)]
pub struct LabelQuery {
    /// Position in the active column list
    pub column: usize,
    pub column_name: String,
    pub filter: EntityFilter,
    pub sql: SqlQuery,
}

/// Summed volume per (source label, target label) for one column pair.
#[derive(Debug, Clone)]
pub struct PairQuery {
    pub source: usize,
    pub target: usize,
    pub source_name: String,
    pub target_name: String,
    /// Columns strictly between source and target that must be empty
    pub skipped: Vec<String>,
    pub filter: EntityFilter,
    pub sql: SqlQuery,
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub labels: Vec<LabelQuery>,
    pub pairs: Vec<PairQuery>,
}

pub struct QueryPlanner<'a> {
    table: &'a str,
    columns: &'a [Column],
    filter: &'a EntityFilter,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(table: &'a str, columns: &'a [Column], filter: &'a EntityFilter) -> Self {
        Self {
            table,
            columns,
            filter,
        }
    }

    pub fn plan(&self) -> QueryPlan {
        let mut labels = Vec::with_capacity(self.columns.len());
        let mut pairs = Vec::new();

        for (source, column) in self.columns.iter().enumerate() {
            labels.push(self.label_query(source, column));
            for target in (source + 1)..self.columns.len() {
                pairs.push(self.pair_query(source, target));
            }
        }

        QueryPlan { labels, pairs }
    }

    fn predicate(&self) -> (String, Vec<Vec<String>>) {
        match self.filter.to_sql(1) {
            Some(pred) => (format!("AND {}", pred.text), pred.params),
            None => (String::new(), Vec::new()),
        }
    }

    fn label_query(&self, index: usize, column: &Column) -> LabelQuery {
        let (predicate, params) = self.predicate();
        let text = format!(
            r#"
            SELECT DISTINCT {col}
            FROM {table}
            WHERE {col} != ''
              AND {vol} != 0
              {predicate}
            ORDER BY {col}
            "#,
            col = column.name,
            table = self.table,
            vol = VOLUME_COLUMN,
        );
        LabelQuery {
            column: index,
            column_name: column.name.clone(),
            filter: self.filter.clone(),
            sql: SqlQuery::new(&text, params),
        }
    }

    fn pair_query(&self, source: usize, target: usize) -> PairQuery {
        let src = &self.columns[source].name;
        let tgt = &self.columns[target].name;
        let skipped: Vec<String> = self.columns[source + 1..target]
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let exclusion: String = skipped
            .iter()
            .map(|name| format!("AND {name} = '' "))
            .collect();
        let (predicate, params) = self.predicate();

        let text = format!(
            r#"
            SELECT {src} AS source,
                   {tgt} AS target,
                   SUM({vol})::float8 AS value
            FROM {table}
            WHERE {src} != ''
              AND {tgt} != ''
              AND {vol} != 0
              {exclusion}
              {predicate}
            GROUP BY {src}, {tgt}
            "#,
            table = self.table,
            vol = VOLUME_COLUMN,
        );

        PairQuery {
            source,
            target,
            source_name: src.clone(),
            target_name: tgt.clone(),
            skipped,
            filter: self.filter.clone(),
            sql: SqlQuery::new(&text, params),
        }
    }
}
