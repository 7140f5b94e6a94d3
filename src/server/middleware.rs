//! Bearer token authentication.

use std::sync::Arc;

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::state::AppState;
use crate::error::TrackerError;

/// Resolve the caller from `Authorization: Bearer <token>` and attach it to
/// the request as a [`UserId`](crate::model::UserId) extension. `/health` is exempt.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let caller = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .and_then(|token| state.auth.user_for(token.trim()));

    match caller {
        Some(user) => {
            tracing::Span::current().record("caller", user.as_str());
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => {
            debug!(path = %request.uri().path(), "Rejected unauthenticated request");
            TrackerError::Unauthorized.into_response()
        }
    }
}
