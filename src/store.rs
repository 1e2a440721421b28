//! Analytic store port
//!
//! The service only ever issues the two query shapes produced by the
//! planner. Execution and storage belong to the store; `PgAnalyticStore`
//! runs them over a sqlx Postgres pool with the filter values bound as
//! `text[]` parameters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::planner::{LabelQuery, PairQuery};

/// One aggregated row of a pair query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairRow {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[async_trait]
pub trait AnalyticStore: Send + Sync {
    /// Distinct non-empty labels of one column, in store order.
    async fn distinct_labels(&self, query: &LabelQuery) -> Result<Vec<String>, StoreError>;

    /// Summed volume per label pair for one column pair.
    async fn pair_volumes(&self, query: &PairQuery) -> Result<Vec<PairRow>, StoreError>;
}

#[cfg(feature = "database")]
pub use pg::PgAnalyticStore;

#[cfg(feature = "database")]
mod pg {
    use super::*;
    use sqlx::PgPool;

    /// Postgres-backed analytic store.
    #[derive(Clone)]
    pub struct PgAnalyticStore {
        pool: PgPool,
    }

    impl PgAnalyticStore {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl AnalyticStore for PgAnalyticStore {
        async fn distinct_labels(&self, query: &LabelQuery) -> Result<Vec<String>, StoreError> {
            let mut q = sqlx::query_scalar::<_, String>(&query.sql.text);
            for values in &query.sql.params {
                q = q.bind(values.clone());
            }
            Ok(q.fetch_all(&self.pool).await?)
        }

        async fn pair_volumes(&self, query: &PairQuery) -> Result<Vec<PairRow>, StoreError> {
            let mut q = sqlx::query_as::<_, (String, String, f64)>(&query.sql.text);
            for values in &query.sql.params {
                q = q.bind(values.clone());
            }
            let rows = q.fetch_all(&self.pool).await?;
            Ok(rows
                .into_iter()
                .map(|(source, target, value)| PairRow {
                    source,
                    target,
                    value,
                })
                .collect())
        }
    }
}
