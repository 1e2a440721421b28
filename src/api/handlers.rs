//! Route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::error::AppError;
use crate::request::SankeyRequest;
use crate::service::{SankeyData, SankeyService};

/// Success envelope of the sankey endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyResponse {
    pub data: SankeyData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /api/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /api/get-sankey-data?isOrderflow=true&solver=a,b&columns=mempool
pub async fn get_sankey_data(
    State(service): State<Arc<SankeyService>>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<SankeyResponse>, AppError> {
    let Query(pairs) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let request = SankeyRequest::from_pairs(pairs);
    let data = service.sankey_data(&request).await?;
    Ok(Json(SankeyResponse { data }))
}
