//! Sankey flow aggregation
//!
//! Turns aggregated flow rows (entity columns plus a volume) into a
//! multi-column flow diagram: nodes per column value, weighted links between
//! adjacent and distant columns.
//!
//! A request plans one label query per column and one volume query per
//! column pair, fetches them all concurrently through a cache-aside layer,
//! then folds long tails into "Other" buckets, disambiguates labels shared
//! across columns and assembles the final nodes, links, colors and
//! positions.

pub mod cache;
pub mod columns;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod graph;
pub mod planner;
pub mod request;
pub mod service;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

pub use config::SankeyConfig;
pub use error::{Result, SankeyError};
pub use request::SankeyRequest;
pub use service::{SankeyData, SankeyService};
