//! Brand registry handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use misfits_core::BrandOption;

use super::error::{reconcile_error, ApiError};
use crate::state::AppState;

/// Brands a transaction can be attributed to, parent bucket last.
pub async fn list_brands(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BrandOption>>, ApiError> {
    let brands = state
        .ledger()
        .list_brands()
        .await
        .map_err(|e| reconcile_error(e.into()))?;

    Ok(Json(BrandOption::list(
        brands,
        &state.config().reconcile.parent_display_name,
    )))
}
