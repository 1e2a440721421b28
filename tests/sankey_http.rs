//! HTTP-level integration tests for the sankey endpoint.
//!
//! The router runs in-process against an in-memory analytic store that
//! evaluates the planned label and pair queries over a handful of rows, so
//! no database or Redis is needed.
//!
//! Run with: cargo test --test sankey_http

#![cfg(feature = "server")]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use sankey_flow::api::build_router;
use sankey_flow::cache::MemoryCache;
use sankey_flow::columns::Taxonomies;
use sankey_flow::error::StoreError;
use sankey_flow::fetcher::RetryPolicy;
use sankey_flow::graph::OTHER_COLOR;
use sankey_flow::planner::{LabelQuery, PairQuery};
use sankey_flow::store::{AnalyticStore, PairRow};
use sankey_flow::SankeyService;
use serde_json::Value;
use tower::ServiceExt;

// ── In-memory analytic store ───────────────────────────────────

/// One aggregated row: entity per column plus its volume.
#[derive(Debug, Clone)]
struct FlowRecord {
    entities: HashMap<String, String>,
    volume: f64,
}

fn record(entities: &[(&str, &str)], volume: f64) -> FlowRecord {
    FlowRecord {
        entities: entities
            .iter()
            .map(|(c, v)| (c.to_string(), v.to_string()))
            .collect(),
        volume,
    }
}

impl FlowRecord {
    fn get(&self, column: &str) -> &str {
        self.entities.get(column).map(String::as_str).unwrap_or("")
    }
}

#[derive(Default)]
struct MemoryStore {
    records: Vec<FlowRecord>,
    /// Label queries for this column always fail
    failing_column: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    fn new(records: Vec<FlowRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AnalyticStore for MemoryStore {
    async fn distinct_labels(&self, query: &LabelQuery) -> Result<Vec<String>, StoreError> {
        self.enter().await;
        if self.failing_column.as_deref() == Some(query.column_name.as_str()) {
            return Err(StoreError::Backend("connection reset".into()));
        }
        let mut labels: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.volume != 0.0 && !r.get(&query.column_name).is_empty())
            .filter(|r| query.filter.matches(|c| Some(r.get(c))))
            .map(|r| r.get(&query.column_name).to_string())
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }

    async fn pair_volumes(&self, query: &PairQuery) -> Result<Vec<PairRow>, StoreError> {
        self.enter().await;
        let mut sums: BTreeMap<(String, String), f64> = BTreeMap::new();
        for r in &self.records {
            let (source, target) = (r.get(&query.source_name), r.get(&query.target_name));
            if source.is_empty() || target.is_empty() || r.volume == 0.0 {
                continue;
            }
            if query.skipped.iter().any(|c| !r.get(c).is_empty()) {
                continue;
            }
            if !query.filter.matches(|c| Some(r.get(c))) {
                continue;
            }
            *sums.entry((source.to_string(), target.to_string())).or_default() += r.volume;
        }
        Ok(sums
            .into_iter()
            .map(|((source, target), value)| PairRow { source, target, value })
            .collect())
    }
}

// ── Helpers ────────────────────────────────────────────────────

/// Orderflow request over just frontend and solver.
const TWO_COLUMNS: &str = "isOrderflow=true&columns=metaaggregator,mempool,ofa,builder";

fn service(store: Arc<MemoryStore>, cache: MemoryCache) -> SankeyService {
    let taxonomies = Taxonomies::new("prodof_aggregated", "prodlq_aggregated");
    SankeyService::new(store, Arc::new(cache), taxonomies).with_retry(RetryPolicy {
        max_attempts: 2,
        delay: Duration::from_millis(1),
    })
}

async fn get(service: Arc<SankeyService>, uri: &str) -> (StatusCode, Value) {
    let app = build_router(service);
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let svc = Arc::new(service(Arc::new(MemoryStore::default()), MemoryCache::new()));
    let (status, body) = get(svc, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_two_column_flow() {
    let store = Arc::new(MemoryStore::new(vec![
        record(&[("frontend", "a1"), ("solver", "b1")], 5.0),
        record(&[("frontend", "a2"), ("solver", "b1")], 3.0),
    ]));
    let svc = Arc::new(service(store, MemoryCache::new()));

    let (status, body) = get(svc, &format!("/api/get-sankey-data?{TWO_COLUMNS}")).await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(strings(&data["labels"]), vec!["a1", "a2", "b1"]);
    assert_eq!(data["links"]["source"], serde_json::json!([0, 1]));
    assert_eq!(data["links"]["target"], serde_json::json!([2, 2]));
    assert_eq!(data["links"]["value"], serde_json::json!([5.0, 3.0]));
    assert_eq!(data["xPositions"], serde_json::json!([0.25, 0.25, 0.75]));
    assert_eq!(data["colors"].as_array().unwrap().len(), 3);
    assert_eq!(data["entityFilter"], "");
    assert!(data["range"].is_null());
}

#[tokio::test]
async fn test_distant_pair_only_counts_rows_skipping_the_middle() {
    let store = Arc::new(MemoryStore::new(vec![
        // passes through the solver: counted on frontend→solver and solver→builder
        record(&[("frontend", "f"), ("solver", "s"), ("builder", "b")], 2.0),
        // bypasses the solver: counted on frontend→builder only
        record(&[("frontend", "f"), ("builder", "b")], 7.0),
    ]));
    let svc = Arc::new(service(store, MemoryCache::new()));

    let (status, body) = get(
        svc,
        "/api/get-sankey-data?isOrderflow=true&columns=metaaggregator,mempool,ofa",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let data = &body["data"];
    assert_eq!(strings(&data["labels"]), vec!["f", "s", "b"]);
    let links: Vec<(u64, u64, f64)> = (0..3)
        .map(|i| {
            (
                data["links"]["source"][i].as_u64().unwrap(),
                data["links"]["target"][i].as_u64().unwrap(),
                data["links"]["value"][i].as_f64().unwrap(),
            )
        })
        .collect();
    assert!(links.contains(&(0, 1, 2.0)));
    assert!(links.contains(&(1, 2, 2.0)));
    assert!(links.contains(&(0, 2, 7.0)));
    assert_eq!(data["links"]["source"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_filter_is_applied_and_echoed() {
    let store = Arc::new(MemoryStore::new(vec![
        record(&[("frontend", "a1"), ("solver", "b1")], 5.0),
        record(&[("frontend", "a2"), ("solver", "b2")], 3.0),
    ]));
    let svc = Arc::new(service(store, MemoryCache::new()));

    let (status, body) = get(svc, &format!("/api/get-sankey-data?{TWO_COLUMNS}&frontend=a2")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(strings(&data["labels"]), vec!["a2", "b2"]);
    assert_eq!(data["entityFilter"], "((frontend = 'a2'))");
}

#[tokio::test]
async fn test_cache_hit_gives_identical_response() {
    let store = Arc::new(MemoryStore::new(vec![
        record(&[("frontend", "a1"), ("solver", "b1")], 5.0),
        record(&[("frontend", "a2"), ("solver", "b1")], 3.0),
    ]));
    let cache = MemoryCache::new();
    let svc = Arc::new(service(store.clone(), cache.clone()));
    let uri = format!("/api/get-sankey-data?{TWO_COLUMNS}");

    let (_, first) = get(svc.clone(), &uri).await;
    // 2 label queries + 1 pair query
    assert_eq!(store.calls(), 3);
    assert_eq!(cache.len().await, 3);

    let (_, second) = get(svc, &uri).await;
    assert_eq!(store.calls(), 3);
    assert_eq!(first, second);
    assert_eq!(cache.open_sessions(), 0);
}

#[tokio::test]
async fn test_distinct_filters_stay_within_cache_cap() {
    let store = Arc::new(MemoryStore::new(vec![record(
        &[("frontend", "a1"), ("solver", "b1")],
        5.0,
    )]));
    let cache = MemoryCache::with_max_entries(30);
    let svc = Arc::new(service(store, cache.clone()));

    for i in 0..20 {
        let uri = format!("/api/get-sankey-data?isOrderflow=true&frontend=x{i}");
        let (status, _) = get(svc.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cache.len().await <= 30);
    }
    assert_eq!(cache.len().await, 30);
}

#[tokio::test]
async fn test_failing_column_degrades_gracefully() {
    let store = Arc::new(MemoryStore {
        records: vec![
            record(&[("frontend", "a1"), ("metaaggregator", "m1"), ("solver", "s1")], 4.0),
            record(&[("frontend", "a1"), ("solver", "s2")], 1.0),
        ],
        failing_column: Some("metaaggregator".into()),
        ..Default::default()
    });
    let svc = Arc::new(service(store, MemoryCache::new()));

    let (status, body) = get(
        svc,
        "/api/get-sankey-data?isOrderflow=true&columns=mempool,ofa,builder",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let labels = strings(&body["data"]["labels"]);
    assert!(!labels.contains(&"m1".to_string()));
    assert!(labels.contains(&"a1".to_string()));
    assert!(labels.contains(&"s2".to_string()));
}

#[tokio::test]
async fn test_deadline_exceeded_is_a_bad_request() {
    let store = Arc::new(MemoryStore {
        records: vec![record(&[("frontend", "a1"), ("solver", "b1")], 5.0)],
        delay: Some(Duration::from_secs(5)),
        ..Default::default()
    });
    let cache = MemoryCache::new();
    let svc = Arc::new(
        service(store, cache.clone()).with_request_timeout(Duration::from_millis(20)),
    );

    let (status, body) = get(svc, &format!("/api/get-sankey-data?{TWO_COLUMNS}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("could not be fetched"));
    assert_eq!(cache.open_sessions(), 0);
}

#[tokio::test]
async fn test_all_queries_are_in_flight_together() {
    let store = Arc::new(MemoryStore {
        records: vec![record(
            &[
                ("frontend", "f"),
                ("metaaggregator", "m"),
                ("solver", "s"),
                ("mempool", "p"),
                ("ofa", "o"),
                ("builder", "b"),
            ],
            1.0,
        )],
        delay: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let svc = Arc::new(service(store.clone(), MemoryCache::new()));

    let started = Instant::now();
    let (status, body) = get(svc, "/api/get-sankey-data?isOrderflow=true").await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    // 6 label queries + 15 pair queries, all issued before any settles
    assert_eq!(store.calls(), 21);
    assert_eq!(store.peak_in_flight(), 21);
    assert!(elapsed < Duration::from_millis(1000), "took {elapsed:?}");
    // only adjacent pairs match a row with every column filled
    assert_eq!(body["data"]["links"]["source"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_shared_address_is_shortened_and_tagged() {
    let address = "0xABCDEF1234567890";
    let store = Arc::new(MemoryStore::new(vec![record(
        &[("frontend", address), ("solver", address)],
        9.0,
    )]));
    let svc = Arc::new(service(store, MemoryCache::new()));

    let (status, body) = get(svc, &format!("/api/get-sankey-data?{TWO_COLUMNS}")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(strings(&data["labels"]), vec!["0xABC…890 (fro)", "0xABC…890 (sol)"]);
    // same canonical label, same color
    assert_eq!(data["colors"][0], data["colors"][1]);
}

#[tokio::test]
async fn test_long_tail_folds_into_other() {
    let records: Vec<FlowRecord> = (0..25)
        .map(|i| {
            let frontend = format!("fe{i:02}");
            record(&[("frontend", frontend.as_str()), ("solver", "s")], (i + 1) as f64)
        })
        .collect();
    let store = Arc::new(MemoryStore::new(records));
    let svc = Arc::new(service(store, MemoryCache::new()));

    let (status, body) = get(svc, &format!("/api/get-sankey-data?{TWO_COLUMNS}")).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    let labels = strings(&data["labels"]);

    // 20 kept frontends, one Other bucket, one solver
    assert_eq!(labels.len(), 22);
    assert_eq!(labels[0], "fe24");
    assert_eq!(labels[20], "Other (frontend)");
    assert_eq!(data["colors"][20], OTHER_COLOR);

    // fe00..fe04 carry volumes 1..=5 into Other
    let sources = data["links"]["source"].as_array().unwrap();
    let values = data["links"]["value"].as_array().unwrap();
    let other_volume: f64 = sources
        .iter()
        .zip(values)
        .filter(|(s, _)| s.as_u64() == Some(20))
        .map(|(_, v)| v.as_f64().unwrap())
        .sum();
    assert_eq!(other_volume, 15.0);
    let total: f64 = values.iter().map(|v| v.as_f64().unwrap()).sum();
    assert_eq!(total, (1..=25).sum::<i32>() as f64);
}
