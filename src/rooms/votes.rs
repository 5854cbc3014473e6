use axum::{debug_handler, extract::{Path, State}, http::StatusCode, Json};
use serde::Deserialize;

use crate::{auth::CurrentIdentity, db::RoomId, votes::{RoomVotes, VoteCoordinator, VoteError}, AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct CastVoteRequest {
    value: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn cast_vote(
    Path(room_id): Path<RoomId>,
    State(coordinator): State<VoteCoordinator>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(CastVoteRequest { value }): Json<CastVoteRequest>,
) -> Result<StatusCode, VoteError> {
    coordinator.cast_vote(room_id, value, identity.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn clear_votes(
    Path(room_id): Path<RoomId>,
    State(coordinator): State<VoteCoordinator>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<StatusCode, VoteError> {
    coordinator.clear_votes(room_id, identity.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler(state = AppState)]
pub(crate) async fn room_votes(
    Path(room_id): Path<RoomId>,
    State(coordinator): State<VoteCoordinator>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<RoomVotes>, VoteError> {
    Ok(Json(coordinator.room_votes(room_id, identity.as_ref()).await?))
}
