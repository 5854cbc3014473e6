mod votes;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{room_id}/votes", get(votes::room_votes).post(votes::cast_vote).delete(votes::clear_votes))
        .route("/{room_id}/ws", get(ws::room_ws))
}
