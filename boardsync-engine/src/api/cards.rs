//! Card read endpoint

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use boardsync_common::models::Card;
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    pub viewer: Uuid,
}

/// GET /api/cards/:id?viewer=
///
/// Returns the card with private columns dropped unless the viewer may see them.
pub async fn get_card(
    State(state): State<AppState>,
    Path(card_id): Path<Uuid>,
    Query(params): Query<ViewerParams>,
) -> ApiResult<Json<Card>> {
    Ok(Json(state.service.card_for_viewer(card_id, params.viewer).await?))
}

pub fn card_routes() -> Router<AppState> {
    Router::new().route("/api/cards/:id", get(get_card))
}
