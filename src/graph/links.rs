//! Link aggregation
//!
//! Pass 1 decodes pair-query rows into `RawLink`s over global label indices.
//! Pass 2 maps both endpoints of every raw link to their final node and sums
//! volume per `(source node, target node)`, so the result has no duplicate
//! endpoint pairs. Links keep the order in which their key was first seen.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::disambiguate::Disambiguation;
use super::index::LabelIndex;
use super::FetchedPair;
use crate::error::{Result, SankeyError};

/// A decoded pair row. Endpoints are global label indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLink {
    pub source: usize,
    pub target: usize,
    pub volume: f64,
}

/// Final links as parallel arrays of node indices and volumes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalLinks {
    pub source: Vec<usize>,
    pub target: Vec<usize>,
    pub value: Vec<f64>,
}

impl FinalLinks {
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn total_volume(&self) -> f64 {
        self.value.iter().sum()
    }
}

/// Pass 1. Rows whose labels are not in the index (their label query was
/// unavailable) are dropped.
pub fn decode_links(index: &LabelIndex, pairs: &[FetchedPair]) -> Vec<RawLink> {
    let mut links = Vec::new();
    let mut dropped = 0usize;

    for pair in pairs {
        for row in &pair.rows {
            match (index.get(pair.source, &row.source), index.get(pair.target, &row.target)) {
                (Some(source), Some(target)) => links.push(RawLink {
                    source,
                    target,
                    volume: row.value,
                }),
                _ => dropped += 1,
            }
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "pair rows reference labels missing from the label index");
    }
    links
}

/// Pass 2.
pub fn aggregate_links(
    links: &[RawLink],
    index: &LabelIndex,
    nodes: &Disambiguation,
) -> Result<FinalLinks> {
    let mut positions: HashMap<(usize, usize), usize> = HashMap::new();
    let mut out = FinalLinks::default();

    for link in links {
        let source = resolve(index, nodes, link.source)?;
        let target = resolve(index, nodes, link.target)?;

        match positions.get(&(source, target)) {
            Some(&pos) => out.value[pos] += link.volume,
            None => {
                positions.insert((source, target), out.value.len());
                out.source.push(source);
                out.target.push(target);
                out.value.push(link.volume);
            }
        }
    }

    Ok(out)
}

fn resolve(index: &LabelIndex, nodes: &Disambiguation, label_index: usize) -> Result<usize> {
    let column = index.column_of(label_index).ok_or_else(|| {
        SankeyError::Inconsistent(format!("label index {label_index} has no column"))
    })?;
    let label = index.label(label_index).ok_or_else(|| {
        SankeyError::Inconsistent(format!("label index {label_index} out of range"))
    })?;
    nodes.node_for(column, label).ok_or_else(|| {
        SankeyError::Inconsistent(format!("label '{label}' in column {column} has no final node"))
    })
}
