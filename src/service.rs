//! Sankey data service
//!
//! One request runs in two phases:
//!
//! 1. Every label query and every pair query is issued concurrently through
//!    the cache-aside fetcher. The phase ends when all of them have settled,
//!    each either with rows or as unavailable, or when the request deadline
//!    passes.
//! 2. The settled results are merged in plan order and handed to the pure
//!    graph pipeline.
//!
//! The cache session is opened for phase 1 only and is released on every
//! exit path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join, join_all};
use serde::{Deserialize, Serialize};

use crate::cache::{period_end, CacheStore};
use crate::columns::Taxonomies;
use crate::config::SankeyConfig;
use crate::error::{Result, SankeyError};
use crate::fetcher::{CacheAsideFetcher, RetryPolicy};
use crate::graph::{build_graph, FetchedFlows, FetchedPair, FinalLinks, GraphSettings, SankeyGraph};
use crate::planner::{QueryPlan, QueryPlanner};
use crate::request::SankeyRequest;
use crate::store::AnalyticStore;

/// Response payload of the sankey endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SankeyData {
    pub entity_filter: String,
    pub links: FinalLinks,
    pub labels: Vec<String>,
    pub colors: Vec<String>,
    pub x_positions: Vec<f64>,
    /// Time range of the data; the aggregated tables carry none
    pub range: Option<serde_json::Value>,
}

impl SankeyData {
    fn new(entity_filter: String, graph: SankeyGraph) -> Self {
        Self {
            entity_filter,
            labels: graph.labels(),
            links: graph.links,
            colors: graph.colors,
            x_positions: graph.x_positions,
            range: None,
        }
    }
}

pub struct SankeyService {
    store: Arc<dyn AnalyticStore>,
    cache: Arc<dyn CacheStore>,
    taxonomies: Taxonomies,
    settings: GraphSettings,
    retry: RetryPolicy,
    cache_period_secs: u64,
    request_timeout: Duration,
}

impl SankeyService {
    pub fn new(
        store: Arc<dyn AnalyticStore>,
        cache: Arc<dyn CacheStore>,
        taxonomies: Taxonomies,
    ) -> Self {
        Self {
            store,
            cache,
            taxonomies,
            settings: GraphSettings::default(),
            retry: RetryPolicy::default(),
            cache_period_secs: 3600,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(
        store: Arc<dyn AnalyticStore>,
        cache: Arc<dyn CacheStore>,
        config: &SankeyConfig,
    ) -> Self {
        Self::new(store, cache, config.taxonomies())
            .with_graph_settings(config.graph_settings())
            .with_retry(config.retry)
            .with_cache_period(config.cache_period_secs)
            .with_request_timeout(config.request_timeout)
    }

    pub fn with_graph_settings(mut self, settings: GraphSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_period(mut self, secs: u64) -> Self {
        self.cache_period_secs = secs;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn sankey_data(&self, request: &SankeyRequest) -> Result<SankeyData> {
        let taxonomy = self.taxonomies.for_mode(request.mode);
        let columns = taxonomy.active_columns(&request.excluded_columns);
        let filter = request.entity_filter(taxonomy);
        let plan = QueryPlanner::new(&taxonomy.table, &columns, &filter).plan();
        let expires_at = period_end(Utc::now(), self.cache_period_secs);

        let session = match self.cache.connect().await {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("cache unavailable, querying the store directly: {e}");
                None
            }
        };
        let fetcher = CacheAsideFetcher::new(session, expires_at, self.retry);

        let (fetched, unavailable) =
            tokio::time::timeout(self.request_timeout, self.fetch_all(&fetcher, &plan))
                .await
                .map_err(|_| SankeyError::DeadlineExceeded(self.request_timeout))?;
        drop(fetcher);

        let graph = build_graph(&columns, &fetched, &self.settings)?;
        tracing::info!(
            mode = request.mode.as_str(),
            columns = columns.len(),
            queries = plan.labels.len() + plan.pairs.len(),
            unavailable,
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "sankey data built"
        );

        Ok(SankeyData::new(filter.to_string(), graph))
    }

    /// Phase 1. Results are merged in plan order regardless of completion
    /// order; unavailable queries contribute nothing.
    async fn fetch_all(
        &self,
        fetcher: &CacheAsideFetcher,
        plan: &QueryPlan,
    ) -> (FetchedFlows, usize) {
        let store = self.store.as_ref();

        let label_fetches = plan
            .labels
            .iter()
            .map(move |q| fetcher.fetch(&q.sql, move || store.distinct_labels(q)));
        let pair_fetches = plan
            .pairs
            .iter()
            .map(move |q| fetcher.fetch(&q.sql, move || store.pair_volumes(q)));

        let (labels, pairs) = join(join_all(label_fetches), join_all(pair_fetches)).await;

        let mut unavailable = 0;
        let labels: Vec<Vec<String>> = labels
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|_| {
                    unavailable += 1;
                    Vec::new()
                })
            })
            .collect();
        let pairs: Vec<FetchedPair> = plan
            .pairs
            .iter()
            .zip(pairs)
            .map(|(q, result)| FetchedPair {
                source: q.source,
                target: q.target,
                rows: result.unwrap_or_else(|_| {
                    unavailable += 1;
                    Vec::new()
                }),
            })
            .collect();

        (FetchedFlows { labels, pairs }, unavailable)
    }
}
