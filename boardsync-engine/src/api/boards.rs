//! Board sync endpoints
//!
//! POST /api/boards/:id/schema, POST /api/boards/:id/sync

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use boardsync_common::models::PropertyTemplate;
use serde::Serialize;
use uuid::Uuid;

use crate::{error::ApiResult, service::SyncReport, AppState};

/// POST /api/boards/:id/schema response
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub board_id: Uuid,
    pub card_properties: Vec<PropertyTemplate>,
}

/// POST /api/boards/:id/schema
///
/// Reconcile the board's columns with the proposal source without touching cards.
pub async fn reconcile_schema(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> ApiResult<Json<SchemaResponse>> {
    let card_properties = state.service.reconcile_schema(board_id).await?;
    Ok(Json(SchemaResponse {
        board_id,
        card_properties,
    }))
}

/// POST /api/boards/:id/sync
pub async fn sync_board(
    State(state): State<AppState>,
    Path(board_id): Path<Uuid>,
) -> ApiResult<Json<SyncReport>> {
    Ok(Json(state.service.sync_board(board_id).await?))
}

pub fn board_routes() -> Router<AppState> {
    Router::new()
        .route("/api/boards/:id/schema", post(reconcile_schema))
        .route("/api/boards/:id/sync", post(sync_board))
}
