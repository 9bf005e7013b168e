use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub const LOGIN_PATH: &str = "/auth/login/";

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    location: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            location: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// `302 Found` to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            message: String::new(),
            location: Some(location.into()),
        }
    }

    /// Send an anonymous visitor to the login page, remembering where they were going.
    pub fn login_required(next: &str) -> Self {
        let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
        Self::redirect(format!("{}?next={}", LOGIN_PATH, next))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(location) = self.location {
            return (self.status, [(header::LOCATION, location)]).into_response();
        }

        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}
