use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::{db::Identity, session::USER_ID, AppError, AppResult};

/// The caller resolved from the session, or `None` when nobody is logged in.
///
/// Absence is not a rejection here: operations decide for themselves whether
/// they need an identity.
pub struct CurrentIdentity(pub Option<Identity>);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> AppResult<Self> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| anyhow::anyhow!(msg))?;

        let identity = session.get::<String>(USER_ID).await?.map(Identity::new);
        Ok(CurrentIdentity(identity))
    }
}
