//! Request parameters
//!
//! Parsed from raw query pairs so that list parameters can be given either
//! repeated (`solver=a&solver=b`) or comma-delimited (`solver=a,b`).

use std::collections::HashMap;

use crate::columns::{Column, FlowMode, Taxonomy};
use crate::filter::EntityFilter;

const MODE_PARAM: &str = "isOrderflow";
const EXCLUDED_COLUMNS_PARAM: &str = "columns";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SankeyRequest {
    pub mode: FlowMode,
    /// Values per parameter name, blanks removed
    pub values: HashMap<String, Vec<String>>,
    /// Columns to drop from the diagram
    pub excluded_columns: Vec<String>,
}

impl SankeyRequest {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        let mut mode_flag: Option<String> = None;

        for (key, value) in pairs {
            let key = key.as_ref();
            if key == MODE_PARAM {
                mode_flag = Some(value.as_ref().trim().to_string());
                continue;
            }
            values
                .entry(key.to_string())
                .or_default()
                .extend(split_list(value.as_ref()));
        }

        let excluded_columns = values.remove(EXCLUDED_COLUMNS_PARAM).unwrap_or_default();
        Self {
            mode: FlowMode::from_flag(mode_flag.as_deref()),
            values,
            excluded_columns,
        }
    }

    pub fn with_mode(mut self, mode: FlowMode) -> Self {
        self.mode = mode;
        self
    }

    /// Selected values for a column: its slot parameter plus its own name.
    pub fn selected(&self, column: &Column) -> Vec<String> {
        let mut selected: Vec<String> = self.values.get(&column.param).cloned().unwrap_or_default();
        if column.name != column.param {
            if let Some(extra) = self.values.get(&column.name) {
                selected.extend(extra.iter().cloned());
            }
        }
        selected
    }

    /// Filter over every column of the taxonomy, excluded columns included.
    pub fn entity_filter(&self, taxonomy: &Taxonomy) -> EntityFilter {
        EntityFilter::build(
            taxonomy
                .columns
                .iter()
                .map(|c| (c.name.clone(), self.selected(c))),
        )
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_and_comma_delimited_values() {
        let req = SankeyRequest::from_pairs(vec![
            ("solver", "a, b"),
            ("solver", "c"),
            ("frontend", ""),
            ("columns", "mempool,ofa"),
        ]);
        assert_eq!(req.values["solver"], vec!["a", "b", "c"]);
        assert!(req.values["frontend"].is_empty());
        assert_eq!(req.excluded_columns, vec!["mempool", "ofa"]);
        assert_eq!(req.mode, FlowMode::Liquidity);
    }

    #[test]
    fn test_mode_flag() {
        let req = SankeyRequest::from_pairs(vec![("isOrderflow", "true")]);
        assert_eq!(req.mode, FlowMode::Orderflow);
    }

    #[test]
    fn test_liquidity_slots_are_positional() {
        let taxonomy = Taxonomy::liquidity("t");
        // `mempool` addresses position 3, which is `aggregator` in liquidity mode
        let req = SankeyRequest::from_pairs(vec![("mempool", "agg1"), ("aggregator", "agg2")]);
        let filter = req.entity_filter(&taxonomy);
        assert_eq!(filter.selections().len(), 1);
        assert_eq!(filter.selections()[0].column, "aggregator");
        assert_eq!(filter.selections()[0].values, vec!["agg1", "agg2"]);
    }

    #[test]
    fn test_filter_covers_excluded_columns() {
        let taxonomy = Taxonomy::orderflow("t");
        let req = SankeyRequest::from_pairs(vec![("solver", "s"), ("columns", "solver")]);
        let filter = req.entity_filter(&taxonomy);
        assert_eq!(filter.to_string(), "((solver = 's'))");
        assert_eq!(taxonomy.active_columns(&req.excluded_columns).len(), 5);
    }
}
