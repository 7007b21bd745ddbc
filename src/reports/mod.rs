use axum::Router;

use crate::state::AppState;

pub mod aggregate;
pub mod consumer;
pub mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::report_routes()
}
