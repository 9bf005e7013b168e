use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup/", post(handlers::signup))
        .route(
            "/auth/login/",
            get(handlers::login_form).post(handlers::login),
        )
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route("/group/:slug/", get(handlers::group_posts))
        .route("/profile/:username/", get(handlers::profile))
        .route(
            "/create/",
            get(handlers::post_create_form).post(handlers::post_create),
        )
        .route("/posts/:id/", get(handlers::post_detail))
        .route(
            "/posts/:id/edit/",
            get(handlers::post_edit_form).post(handlers::post_edit),
        )
        .route("/posts/:id/delete/", post(handlers::post_delete))
        .route("/posts/:id/comment/", post(handlers::add_comment))
}

pub fn follows() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(handlers::follow_index))
        .route("/profile/:username/follow/", get(handlers::profile_follow))
        .route(
            "/profile/:username/unfollow/",
            get(handlers::profile_unfollow),
        )
}

pub fn admin() -> Router<AppState> {
    Router::new().route("/admin/cache/clear", post(handlers::clear_cache))
}
