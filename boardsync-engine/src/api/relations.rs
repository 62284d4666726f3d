//! Relation property endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{post, put},
    Json, Router,
};
use boardsync_common::models::{Board, Card};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiResult, AppState};

/// POST /api/boards/:id/relations/:property_id request
#[derive(Debug, Default, Deserialize)]
pub struct LinkRequest {
    /// Name of the inverse property if one gets created
    #[serde(default)]
    pub label: Option<String>,
}

/// PUT /api/boards/:id/relations/:property_id/cards/:card_id request
#[derive(Debug, Deserialize)]
pub struct RelatedCardsRequest {
    pub card_ids: Vec<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveParams {
    #[serde(default)]
    pub remove_both: bool,
}

/// POST /api/boards/:id/relations/:property_id
pub async fn link_relation(
    State(state): State<AppState>,
    Path((board_id, property_id)): Path<(Uuid, String)>,
    request: Option<Json<LinkRequest>>,
) -> ApiResult<Json<Board>> {
    let label = request.and_then(|Json(r)| r.label);
    let board = state
        .service
        .sync_relation_property(board_id, &property_id, label)
        .await?;
    Ok(Json(board))
}

/// PUT /api/boards/:id/relations/:property_id/cards/:card_id
pub async fn set_related_cards(
    State(state): State<AppState>,
    Path((board_id, property_id, card_id)): Path<(Uuid, String, Uuid)>,
    Json(request): Json<RelatedCardsRequest>,
) -> ApiResult<Json<Card>> {
    let card = state
        .service
        .sync_related_cards_values(board_id, &property_id, card_id, request.card_ids)
        .await?;
    Ok(Json(card))
}

/// DELETE /api/boards/:id/relations/:property_id?remove_both=
pub async fn remove_relation(
    State(state): State<AppState>,
    Path((board_id, property_id)): Path<(Uuid, String)>,
    Query(params): Query<RemoveParams>,
) -> ApiResult<Json<Board>> {
    let board = state
        .service
        .remove_relation_property(board_id, &property_id, params.remove_both)
        .await?;
    Ok(Json(board))
}

pub fn relation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/boards/:id/relations/:property_id",
            post(link_relation).delete(remove_relation),
        )
        .route(
            "/api/boards/:id/relations/:property_id/cards/:card_id",
            put(set_related_cards),
        )
}
