//! Login, OAuth callback and logout handlers.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};
use crate::handlers::error_page;
use crate::session::{SessionData, SessionId};
use crate::AppState;

use super::types::LOGIN_SCOPES;

/// Step 1: send the browser to the identity provider's sign-in page.
pub async fn login(State(state): State<AppState>) -> Response {
    tracing::info!("login");

    match start_login(&state).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Failed to get auth url: {:?}", e);
            error_page(&state).await
        }
    }
}

async fn start_login(state: &AppState) -> GatewayResult<Response> {
    let csrf_state = uuid::Uuid::new_v4().to_string();
    let redirect_uri = state.config.redirect_uri();

    let auth_url = state
        .identity
        .auth_code_url(&LOGIN_SCOPES, &redirect_uri, &csrf_state)
        .await?;
    let state_cookie = state
        .session_cookie
        .build_login_state(&csrf_state)
        .map_err(|e| GatewayError::session(format!("failed to sign login state: {}", e)))?;

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, auth_url),
            (header::SET_COOKIE, state_cookie),
        ],
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct RedirectParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Step 2: the identity provider sends the browser back with a code.
pub async fn redirect(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RedirectParams>,
) -> Response {
    tracing::info!("redirect");

    match handle_redirect_inner(&state, &headers, params).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Login callback failed: {:?}", e);
            error_page(&state).await
        }
    }
}

async fn handle_redirect_inner(
    state: &AppState,
    headers: &HeaderMap,
    params: RedirectParams,
) -> GatewayResult<Response> {
    if let Some(error) = params.error {
        return Err(GatewayError::identity(format!(
            "authorization failed: {} ({})",
            error,
            params.error_description.unwrap_or_default()
        )));
    }

    // Must match the value `/login` signed into the state cookie.
    let csrf_state = params.state.unwrap_or_default();
    if !state.session_cookie.verify_login_state(headers, &csrf_state) {
        return Err(GatewayError::identity("login state missing or mismatched"));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| GatewayError::identity("missing authorization code"))?;

    let result = state
        .identity
        .acquire_token_by_code(&code, &LOGIN_SCOPES, &state.config.redirect_uri())
        .await?;

    // A fresh id on every login so a pre-existing cookie cannot be fixated.
    if let Some(previous) = state.session_cookie.extract(headers) {
        if let Err(e) = state.sessions.destroy(&previous).await {
            tracing::warn!("Failed to drop previous session: {:?}", e);
        }
    }

    let session_id = SessionId::generate();
    let username = result.account.username.clone();
    state
        .sessions
        .set(
            &session_id,
            SessionData {
                user: result.account,
                access_token: result.access_token,
            },
        )
        .await?;

    let cookie = state
        .session_cookie
        .build(&session_id)
        .map_err(|e| GatewayError::session(format!("failed to sign session cookie: {}", e)))?;

    tracing::info!("Successful login for: {}", username);

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, "/profile")],
        AppendHeaders([
            (header::SET_COOKIE, cookie),
            (header::SET_COOKIE, state.session_cookie.clear_login_state()),
        ]),
    )
        .into_response())
}

/// Destroy the session and sign out at the identity provider.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let logout_url = state.identity.logout_url(&state.config.base_url());

    if let Some(session_id) = state.session_cookie.extract(&headers) {
        if let Err(e) = state.sessions.destroy(&session_id).await {
            tracing::error!("Session destroy error: {:?}", e);
        }
    }

    (
        StatusCode::FOUND,
        [
            (header::LOCATION, logout_url),
            (header::SET_COOKIE, state.session_cookie.clear()),
        ],
    )
}
