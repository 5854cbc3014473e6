use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

/// Failures surfaced by the vote coordinator.
///
/// Every variant except [`VoteError::Store`] is raised by a check that runs
/// before any write, so a caller seeing one of them knows nothing changed.
#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("You must be logged in to perform this action")]
    AuthenticationRequired,
    #[error("Room not found")]
    RoomNotFound,
    #[error("Must be a room participant to vote")]
    NotAParticipant,
    #[error("You do not have permission to delete votes")]
    InsufficientPermission,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl VoteError {
    pub fn code(&self) -> &'static str {
        use VoteError::*;
        match self {
            AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            RoomNotFound => "ROOM_NOT_FOUND",
            NotAParticipant => "NOT_A_PARTICIPANT",
            InsufficientPermission => "INSUFFICIENT_PERMISSION",
            Store(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        use VoteError::*;
        match self {
            AuthenticationRequired => StatusCode::UNAUTHORIZED,
            RoomNotFound => StatusCode::NOT_FOUND,
            NotAParticipant | InsufficientPermission => StatusCode::FORBIDDEN,
            Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for VoteError {
    fn into_response(self) -> Response {
        let message = match &self {
            VoteError::Store(err) => {
                tracing::error!(error = ?err, "store failure");
                "internal error".to_owned()
            }
            other => other.to_string(),
        };

        (
            self.status(),
            Json(ErrorBody { code: self.code(), message }),
        )
            .into_response()
    }
}
