//! Clients for the services the API talks to besides its own database.

pub mod ai;
pub mod blockchain;
mod handlers;
pub mod hospitals;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
