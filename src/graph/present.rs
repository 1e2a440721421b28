//! Node presentation: color and horizontal position.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::disambiguate::FinalNode;

/// Neutral gray for long-tail buckets.
pub const OTHER_COLOR: &str = "#999999";

/// Label → color table, looked up by canonical label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    colors: HashMap<String, String>,
}

impl Palette {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Default frontend colors.
    pub fn builtin() -> Self {
        let colors = [
            ("Uniswap", "#ff007a"),
            ("Uniswap Labs", "#ff007a"),
            ("1inch", "#1b314f"),
            ("MetaMask", "#f6851b"),
            ("Metamask", "#f6851b"),
            ("CoW Swap", "#052b65"),
            ("Matcha", "#46d37e"),
            ("Paraswap", "#2669f5"),
            ("Rabby", "#7084ff"),
            ("Phantom", "#ab9ff2"),
            ("Coinbase Wallet", "#0052ff"),
            ("Telegram Bots", "#229ed9"),
            ("Unknown", "#cccccc"),
        ]
        .into_iter()
        .map(|(label, color)| (label.to_string(), color.to_string()))
        .collect();
        Self { colors }
    }

    /// Add or replace entries.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.colors.extend(overrides);
        self
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.colors.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Color of a node: gray for Other buckets, the palette entry of its
    /// canonical label, otherwise a color derived from that label.
    pub fn color_for(&self, node: &FinalNode) -> String {
        if node.is_other {
            return OTHER_COLOR.to_string();
        }
        self.get(&node.canonical)
            .map(str::to_string)
            .unwrap_or_else(|| derived_color(&node.canonical))
    }
}

/// Deterministic `#rrggbb` color from the first three bytes of the label's
/// SHA-256 digest.
pub fn derived_color(label: &str) -> String {
    let digest = Sha256::digest(label.as_bytes());
    format!("#{}", hex::encode(&digest[..3]))
}

/// Center of grid column `column` out of `column_count` evenly spaced ones.
pub fn x_position(column: usize, column_count: usize) -> f64 {
    (column as f64 + 0.5) / column_count.max(1) as f64
}

/// Colors and x positions, parallel to `nodes`.
pub fn present(
    nodes: &[FinalNode],
    column_count: usize,
    palette: &Palette,
) -> (Vec<String>, Vec<f64>) {
    nodes
        .iter()
        .map(|node| (palette.color_for(node), x_position(node.column, column_count)))
        .unzip()
}
