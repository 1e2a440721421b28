//! Global label index
//!
//! Every `(column, label)` pair gets one integer, assigned column by column
//! in column order and, within a column, in the order the store returned the
//! labels. The reverse map records which column owns each index.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    labels: Vec<String>,
    owners: Vec<usize>,
    by_column: Vec<HashMap<String, usize>>,
}

impl LabelIndex {
    /// Index the labels of each column. A label repeated within one column
    /// keeps its first index.
    pub fn build(columns: &[Vec<String>]) -> Self {
        let mut index = LabelIndex {
            by_column: vec![HashMap::new(); columns.len()],
            ..Default::default()
        };
        for (column, values) in columns.iter().enumerate() {
            for value in values {
                if index.by_column[column].contains_key(value) {
                    continue;
                }
                let next = index.labels.len();
                index.by_column[column].insert(value.clone(), next);
                index.labels.push(value.clone());
                index.owners.push(column);
            }
        }
        index
    }

    pub fn get(&self, column: usize, label: &str) -> Option<usize> {
        self.by_column.get(column)?.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn column_of(&self, index: usize) -> Option<usize> {
        self.owners.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.by_column.len()
    }

    /// Indices owned by `column`, in assignment order.
    pub fn column_indices(&self, column: usize) -> impl Iterator<Item = usize> + '_ {
        self.owners
            .iter()
            .enumerate()
            .filter(move |(_, owner)| **owner == column)
            .map(|(i, _)| i)
    }
}
