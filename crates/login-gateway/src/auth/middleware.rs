//! Session middleware for pages that need a signed-in user.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::error::GatewayResult;
use crate::handlers::{error_page, found};
use crate::session::{SessionData, SessionId};
use crate::AppState;

/// Session attached to the request by [`require_session`].
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub id: SessionId,
    pub data: SessionData,
}

/// Middleware that requires a live session.
///
/// Anonymous requests are redirected to `/login`; otherwise the session is
/// inserted as a [`CurrentSession`] request extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match current_session(&state, request.headers()).await {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Ok(None) => found("/login"),
        Err(e) => {
            tracing::error!("Failed to load session: {:?}", e);
            error_page(&state).await
        }
    }
}

/// Look up the session named by the request's cookie.
pub async fn current_session(
    state: &AppState,
    headers: &HeaderMap,
) -> GatewayResult<Option<CurrentSession>> {
    let Some(id) = state.session_cookie.extract(headers) else {
        return Ok(None);
    };

    Ok(state
        .sessions
        .get(&id)
        .await?
        .map(|data| CurrentSession { id, data }))
}
