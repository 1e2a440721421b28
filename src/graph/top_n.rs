//! Top-N reduction
//!
//! A label's score is the total volume of every raw link it is an endpoint
//! of. Each column keeps its `top_n` best-scoring labels; when the column
//! has more labels than that, the rest fold into one `Other (<plural>)`
//! bucket. Equal scores keep the order the labels were indexed in.

use std::collections::HashMap;

use super::index::LabelIndex;
use super::links::RawLink;
use crate::columns::Column;

/// Where a raw label ends up after reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Kept; position in the column's rank order
    Kept(usize),
    Other,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnReduction {
    /// Kept labels, best score first
    pub kept: Vec<String>,
    /// Label of the long-tail bucket, if the column has one
    pub other: Option<String>,
    assignment: HashMap<String, Bucket>,
}

impl ColumnReduction {
    pub fn bucket(&self, label: &str) -> Option<Bucket> {
        self.assignment.get(label).copied()
    }

    /// Every raw label of the column with its bucket.
    pub fn assignments(&self) -> impl Iterator<Item = (&str, Bucket)> + '_ {
        self.assignment.iter().map(|(label, bucket)| (label.as_str(), *bucket))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reduction {
    pub columns: Vec<ColumnReduction>,
}

/// Popularity score per global label index.
pub fn label_scores(index: &LabelIndex, links: &[RawLink]) -> Vec<f64> {
    let mut scores = vec![0.0; index.len()];
    for link in links {
        scores[link.source] += link.volume;
        scores[link.target] += link.volume;
    }
    scores
}

pub fn reduce(
    columns: &[Column],
    index: &LabelIndex,
    links: &[RawLink],
    top_n: usize,
) -> Reduction {
    let scores = label_scores(index, links);

    let columns = columns
        .iter()
        .enumerate()
        .map(|(position, column)| {
            let mut ranked: Vec<usize> = index.column_indices(position).collect();
            // stable: ties keep index order
            ranked.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

            let has_other = ranked.len() > top_n;
            let mut reduction = ColumnReduction {
                other: has_other.then(|| column.other_label()),
                ..Default::default()
            };

            for (rank, label_index) in ranked.into_iter().enumerate() {
                let Some(label) = index.label(label_index) else {
                    continue;
                };
                let bucket = if rank < top_n {
                    reduction.kept.push(label.to_string());
                    Bucket::Kept(rank)
                } else {
                    Bucket::Other
                };
                reduction.assignment.insert(label.to_string(), bucket);
            }

            tracing::debug!(
                column = %column.name,
                kept = reduction.kept.len(),
                folded = reduction.assignment.len() - reduction.kept.len(),
                "top-n reduction"
            );
            reduction
        })
        .collect();

    Reduction { columns }
}
