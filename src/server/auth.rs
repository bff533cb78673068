use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::app::ports::SessionState;
use crate::common::error::CatalogError;
use crate::server::AppState;

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Admin boundary: only authenticated sessions reach the mutating routes.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = bearer_token(&request);
    match state.sessions.session(token.as_deref()).await {
        SessionState::Authenticated { subject } => {
            debug!(%subject, path = %request.uri().path(), "Admin request");
            next.run(request).await
        }
        SessionState::Unauthenticated => CatalogError::Unauthorized.into_response(),
        SessionState::Loading => CatalogError::SessionLoading.into_response(),
    }
}
