//! Misfit feed and reconciliation handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use misfits_core::{
    load_feed, BatchResult, BulkRequest, DisputeOutcome, FeeType, FeedKind, FeedQuery,
    MisfitFeed, ReconcileApi, ReconcileOutcome, ReconcileRequest,
};

use super::error::{api_error, body_error, reconcile_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for feed queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for feed queries
const DEFAULT_LIMIT: i64 = 50;

/// Query parameters for the misfit feed
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    /// `credit`, `unattributed` or `pending_credits`; unset means any open gap
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub fee_type: Option<String>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FeedParams {
    fn into_query(self) -> Result<FeedQuery, ApiError> {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);

        let mut query = FeedQuery::new().with_limit(limit).with_offset(offset);

        if let Some(kind) = self.kind.as_deref().filter(|k| !k.is_empty()) {
            let kind = FeedKind::parse(kind).ok_or_else(|| {
                api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Unknown feed type: {}", kind),
                )
            })?;
            query = query.with_kind(kind);
        }

        if let Some(fee_type) = self.fee_type.as_deref().filter(|f| !f.is_empty()) {
            let parsed = FeeType::parse(fee_type);
            if parsed.as_str() != fee_type {
                return Err(api_error(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("Unknown fee type: {}", fee_type),
                ));
            }
            query = query.with_fee_type(parsed);
        }

        if let Some(search) = self.search.map(|s| s.trim().to_string()) {
            if !search.is_empty() {
                query = query.with_search(search);
            }
        }

        Ok(query)
    }
}

/// One feed page with suggestions for its credits.
pub async fn get_feed(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeedParams>,
) -> Result<Json<MisfitFeed>, ApiError> {
    let query = params.into_query()?;
    debug!(?query, "Fetching misfit feed");

    load_feed(state.ledger(), &query, &state.config().matching)
        .await
        .map(Json)
        .map_err(reconcile_error)
}

/// Single mutating call: connect_ticket, create_ticket or set_brand.
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ReconcileRequest>, JsonRejection>,
) -> Result<Json<ReconcileOutcome>, ApiError> {
    let Json(request) = body.map_err(body_error)?;

    state
        .coordinator()
        .reconcile(request)
        .await
        .map(Json)
        .map_err(reconcile_error)
}

/// Move one transaction into the dispute workflow.
pub async fn dispute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DisputeOutcome>, ApiError> {
    state
        .coordinator()
        .dispute(&id)
        .await
        .map(Json)
        .map_err(reconcile_error)
}

/// Server-side fan-out. Always 200 once the body parses; failures are
/// reported per item.
pub async fn bulk(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<BatchResult>, ApiError> {
    let Json(request) = body.map_err(body_error)?;

    if request.transaction_ids.len() > MAX_LIMIT as usize {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("At most {} transactions per bulk call", MAX_LIMIT),
        ));
    }

    let result = state
        .bulk()
        .apply(&request.action, &request.transaction_ids)
        .await;
    Ok(Json(result))
}
