use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderName;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::app::auth::authenticate_access_token;
use crate::app::users::UserService;
use crate::http::AppError;
use crate::AppState;

/// An authenticated visitor. Rejects anonymous requests with a redirect to the login page.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct AdminToken;

const ADMIN_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-admin-token");

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let next = parts
            .uri
            .path_and_query()
            .map(|value| value.as_str())
            .unwrap_or("/");

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::login_required(next))?;

        let session = authenticate_access_token(&state.paseto_access_key, token)
            .map_err(|err| {
                tracing::error!(error = ?err, "failed to authenticate");
                AppError::internal("failed to authenticate")
            })?
            .ok_or_else(|| AppError::login_required(next))?;

        let user = UserService::new(state.db.clone())
            .get_user(session.user_id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, user_id = %session.user_id, "failed to load session user");
                AppError::internal("failed to authenticate")
            })?
            .ok_or_else(|| AppError::login_required(next))?;

        Ok(AuthUser {
            user_id: user.id,
            username: user.username,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .admin_token
            .as_ref()
            .ok_or_else(|| AppError::forbidden("admin token not configured"))?;

        let provided = parts
            .headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::forbidden("missing admin token"))?;

        if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
            return Err(AppError::forbidden("invalid admin token"));
        }

        Ok(AdminToken)
    }
}
