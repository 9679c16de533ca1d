//! Order listing and statistics endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use domain::OrderStatus;
use order_store::{OrderRecord, OrderStore};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::webhook::AppState;

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub by_status: BTreeMap<String, u64>,
    pub total: u64,
    pub generated_at: DateTime<Utc>,
}

/// GET /orders?status=&limit= — recent orders, newest first.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<OrderRecord>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            OrderStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {raw}")))
        })
        .transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);

    let records = state.store.list(status, limit).await?;
    Ok(Json(records))
}

/// GET /stats — per-status order counts.
pub async fn stats<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.stats().await?;
    Ok(Json(StatsResponse {
        by_status: stats.by_status,
        total: stats.total,
        generated_at: Utc::now(),
    }))
}
