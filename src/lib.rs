pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod res;
pub mod rooms;
pub mod session;
pub mod store;
pub mod votes;

use axum::extract::FromRef;

pub use appresult::{AppError, AppResult};
pub use config::Config;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub coordinator: votes::VoteCoordinator,
}
