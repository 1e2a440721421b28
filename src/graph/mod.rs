//! Flow graph assembly
//!
//! The pure half of a request. Takes the settled results of every label and
//! pair query and produces the final nodes, links, colors and positions:
//!
//! ```text
//! LabelIndex → decode_links → reduce (top-N) → Disambiguation
//!            → aggregate_links → present
//! ```
//!
//! Nothing here suspends or touches I/O; identical inputs give identical
//! output.

pub mod disambiguate;
pub mod index;
pub mod links;
pub mod present;
pub mod top_n;

use std::collections::HashMap;

use crate::columns::Column;
use crate::error::Result;
use crate::store::PairRow;

pub use disambiguate::{truncate_address, Disambiguation, FinalNode};
pub use index::LabelIndex;
pub use links::{aggregate_links, decode_links, FinalLinks, RawLink};
pub use present::{derived_color, x_position, Palette, OTHER_COLOR};
pub use top_n::{reduce, Bucket, Reduction};

/// Default number of labels kept per column.
pub const DEFAULT_TOP_N: usize = 20;

/// Rows of one settled pair query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPair {
    pub source: usize,
    pub target: usize,
    pub rows: Vec<PairRow>,
}

/// Everything Phase 1 produced, merged in plan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedFlows {
    /// Labels per active column; empty when the column's query was unavailable
    pub labels: Vec<Vec<String>>,
    pub pairs: Vec<FetchedPair>,
}

#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub top_n: usize,
    pub palette: Palette,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            palette: Palette::builtin(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SankeyGraph {
    pub nodes: Vec<FinalNode>,
    pub links: FinalLinks,
    pub colors: Vec<String>,
    pub x_positions: Vec<f64>,
    /// Total volume of the decoded raw links
    pub raw_volume: f64,
}

impl SankeyGraph {
    pub fn labels(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.label.clone()).collect()
    }

    /// Display label → canonical label.
    pub fn canonical_map(&self) -> HashMap<&str, &str> {
        self.nodes
            .iter()
            .map(|n| (n.label.as_str(), n.canonical.as_str()))
            .collect()
    }
}

pub fn build_graph(
    columns: &[Column],
    fetched: &FetchedFlows,
    settings: &GraphSettings,
) -> Result<SankeyGraph> {
    let index = LabelIndex::build(&fetched.labels);
    let raw = decode_links(&index, &fetched.pairs);
    let reduction = reduce(columns, &index, &raw, settings.top_n);
    let nodes = Disambiguation::build(columns, &reduction);
    let links = aggregate_links(&raw, &index, &nodes)?;
    let (colors, x_positions) = present::present(&nodes.nodes, columns.len(), &settings.palette);

    let raw_volume = raw.iter().map(|l| l.volume).sum();
    tracing::debug!(
        labels = index.len(),
        raw_links = raw.len(),
        nodes = nodes.nodes.len(),
        links = links.len(),
        "flow graph assembled"
    );

    Ok(SankeyGraph {
        nodes: nodes.nodes,
        links,
        colors,
        x_positions,
        raw_volume,
    })
}
