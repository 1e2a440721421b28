//! Column taxonomies
//!
//! A taxonomy is the fixed, ordered list of entity columns that make up the
//! stages of a flow diagram, plus the table the aggregated rows live in.
//! Columns are configuration, never request data.

use serde::Serialize;

/// Name of the volume column shared by both aggregated tables.
pub const VOLUME_COLUMN: &str = "total_volume";

/// Request parameter names addressing column positions 0..5 of the active
/// taxonomy. The liquidity taxonomy reuses the orderflow slot names.
pub const SELECTION_SLOTS: [&str; 6] = [
    "frontend",
    "metaAggregator",
    "solver",
    "mempool",
    "ofa",
    "builder",
];

/// A single categorical stage of the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name in the aggregated table
    pub name: String,
    /// Request parameter carrying the selection for this column
    pub param: String,
    /// 3-letter tag used to disambiguate labels shared with other columns
    pub tag: String,
    /// Plural used in the column's "Other (...)" bucket
    pub plural: String,
}

impl Column {
    /// Build a column using the built-in tag and plural tables.
    pub fn new(name: &str, param: &str) -> Self {
        Self {
            name: name.to_string(),
            param: param.to_string(),
            tag: column_tag(name),
            plural: column_plural(name),
        }
    }

    /// Display label of this column's long-tail bucket.
    pub fn other_label(&self) -> String {
        format!("Other ({})", self.plural)
    }
}

/// Which of the two fixed taxonomies a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowMode {
    Orderflow,
    #[default]
    Liquidity,
}

impl FlowMode {
    /// Parse the `isOrderflow` flag. Only the literal `true` selects orderflow.
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("true") => FlowMode::Orderflow,
            _ => FlowMode::Liquidity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowMode::Orderflow => "orderflow",
            FlowMode::Liquidity => "liquidity",
        }
    }
}

/// Ordered columns plus the table they are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    pub table: String,
    pub columns: Vec<Column>,
}

impl Taxonomy {
    pub fn orderflow(table: impl Into<String>) -> Self {
        Self::from_names(
            table,
            &["frontend", "metaaggregator", "solver", "mempool", "ofa", "builder"],
        )
    }

    pub fn liquidity(table: impl Into<String>) -> Self {
        Self::from_names(
            table,
            &[
                "frontend",
                "metaaggregator",
                "solver",
                "aggregator",
                "liquidity_src",
                "pmm",
            ],
        )
    }

    fn from_names(table: impl Into<String>, names: &[&str]) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, &name)| Column::new(name, SELECTION_SLOTS.get(i).copied().unwrap_or(name)))
            .collect();
        Self {
            table: table.into(),
            columns,
        }
    }

    /// Columns that remain after dropping every name in `excluded`.
    /// Unknown names are ignored.
    pub fn active_columns(&self, excluded: &[String]) -> Vec<Column> {
        self.columns
            .iter()
            .filter(|c| !excluded.iter().any(|e| e == &c.name))
            .cloned()
            .collect()
    }
}

/// Both taxonomies, as configured for this deployment.
#[derive(Debug, Clone)]
pub struct Taxonomies {
    pub orderflow: Taxonomy,
    pub liquidity: Taxonomy,
}

impl Taxonomies {
    pub fn new(orderflow_table: &str, liquidity_table: &str) -> Self {
        Self {
            orderflow: Taxonomy::orderflow(orderflow_table),
            liquidity: Taxonomy::liquidity(liquidity_table),
        }
    }

    pub fn for_mode(&self, mode: FlowMode) -> &Taxonomy {
        match mode {
            FlowMode::Orderflow => &self.orderflow,
            FlowMode::Liquidity => &self.liquidity,
        }
    }
}

fn column_tag(name: &str) -> String {
    let tag = match name {
        "frontend" => "fro",
        "metaaggregator" => "met",
        "solver" => "sol",
        "mempool" => "mem",
        "ofa" => "ofa",
        "builder" => "bui",
        "aggregator" => "agg",
        "liquidity_src" => "liq",
        "pmm" => "pmm",
        other => return other.chars().take(3).collect(),
    };
    tag.to_string()
}

fn column_plural(name: &str) -> String {
    match name {
        "solver" => "solvers".to_string(),
        other => other.to_string(),
    }
}
