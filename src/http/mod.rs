use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::{AppError, LOGIN_PATH};

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::posts())
        .merge(routes::follows())
        .merge(routes::admin())
        .fallback(handlers::not_found)
        .with_state(state)
}
