//! Label disambiguation
//!
//! Turns the reduced labels of every column into final display labels:
//!
//! 1. Address-like labels (`0x…`, longer than 10 chars) are shortened to
//!    their first 5 and last 3 characters. Two labels of one column that
//!    would shorten to the same string keep their full form.
//! 2. A display label present in more than one column gets the column's
//!    tag appended, e.g. `Uniswap (fro)` and `Uniswap (agg)`.
//!
//! Colors are looked up by the canonical (unshortened, untagged) label, so
//! the reverse map from display to canonical label is kept alongside.

use std::collections::{HashMap, HashSet};

use super::top_n::{Bucket, Reduction};
use crate::columns::Column;

const ADDRESS_PREFIX: &str = "0x";
const ADDRESS_MAX_LEN: usize = 10;

/// Shorten an address-like label to `0xABC…890`.
pub fn truncate_address(label: &str) -> String {
    let chars: Vec<char> = label.chars().collect();
    if !label.starts_with(ADDRESS_PREFIX) || chars.len() <= ADDRESS_MAX_LEN {
        return label.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{head}…{tail}")
}

/// A node of the final diagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalNode {
    pub label: String,
    /// Label before shortening and tagging
    pub canonical: String,
    pub column: usize,
    pub is_other: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Disambiguation {
    /// Grouped by column in column order; kept labels by rank, then Other
    pub nodes: Vec<FinalNode>,
    assignments: Vec<HashMap<String, usize>>,
    canonical: HashMap<String, String>,
}

impl Disambiguation {
    pub fn build(columns: &[Column], reduction: &Reduction) -> Self {
        let mut drafts: Vec<Vec<FinalNode>> = reduction
            .columns
            .iter()
            .take(columns.len())
            .enumerate()
            .map(|(position, reduced)| {
                let kept = reduced.kept.iter().map(|label| FinalNode {
                    label: truncate_address(label),
                    canonical: label.clone(),
                    column: position,
                    is_other: false,
                });
                let other = reduced.other.iter().map(|label| FinalNode {
                    label: label.clone(),
                    canonical: label.clone(),
                    column: position,
                    is_other: true,
                });
                kept.chain(other).collect()
            })
            .collect();

        for column in drafts.iter_mut() {
            restore_clashing_truncations(column);
        }

        let mut owners: HashMap<String, HashSet<usize>> = HashMap::new();
        for node in drafts.iter().flatten() {
            owners.entry(node.label.clone()).or_default().insert(node.column);
        }

        let mut used: HashSet<String> = HashSet::new();
        let mut nodes = Vec::new();
        for node in drafts.into_iter().flatten() {
            let mut label = node.label;
            if owners.get(&label).is_some_and(|cols| cols.len() > 1) {
                label = format!("{label} ({})", columns[node.column].tag);
            }
            let label = unique(label, &used);
            used.insert(label.clone());
            nodes.push(FinalNode { label, ..node });
        }

        let mut offset = 0;
        let mut assignments = Vec::with_capacity(reduction.columns.len());
        for reduced in &reduction.columns {
            let column_nodes: HashMap<String, usize> = reduced
                .assignments()
                .map(|(label, bucket)| {
                    let position = match bucket {
                        Bucket::Kept(rank) => rank,
                        Bucket::Other => reduced.kept.len(),
                    };
                    (label.to_string(), offset + position)
                })
                .collect();
            offset += reduced.kept.len() + usize::from(reduced.other.is_some());
            assignments.push(column_nodes);
        }

        let canonical = nodes
            .iter()
            .map(|n| (n.label.clone(), n.canonical.clone()))
            .collect();

        Self {
            nodes,
            assignments,
            canonical,
        }
    }

    /// Final node index of a raw label.
    pub fn node_for(&self, column: usize, raw_label: &str) -> Option<usize> {
        self.assignments.get(column)?.get(raw_label).copied()
    }

    /// Final display label of a raw label.
    pub fn display_label(&self, column: usize, raw_label: &str) -> Option<&str> {
        let node = self.node_for(column, raw_label)?;
        self.nodes.get(node).map(|n| n.label.as_str())
    }

    /// Canonical label behind a display label.
    pub fn canonical(&self, display: &str) -> Option<&str> {
        self.canonical.get(display).map(String::as_str)
    }
}

fn restore_clashing_truncations(column: &mut [FinalNode]) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for node in column.iter() {
        *counts.entry(node.label.as_str()).or_default() += 1;
    }
    let clashing: HashSet<String> = counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(label, _)| label.to_string())
        .collect();
    for node in column.iter_mut() {
        if clashing.contains(&node.label) {
            node.label = node.canonical.clone();
        }
    }
}

fn unique(label: String, used: &HashSet<String>) -> String {
    if !used.contains(&label) {
        return label;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{label} [{n}]");
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
