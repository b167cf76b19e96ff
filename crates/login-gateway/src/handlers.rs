use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Extension,
};

use crate::auth::{current_session, CurrentSession};
use crate::error::GatewayResult;
use crate::templates::{self, render};
use crate::AppState;

/// 302 to `location`.
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Generic error page with status 500. Falls back to plain text when the
/// error template itself cannot be read.
pub async fn error_page(state: &AppState) -> Response {
    match state.templates.load(templates::ERROR).await {
        Ok(html) => (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub async fn index(State(state): State<AppState>) -> Response {
    match state.templates.load(templates::INDEX).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("Failed to render index: {:?}", e);
            error_page(&state).await
        }
    }
}

// Runs behind `require_session`, so the session is always present here.
pub async fn profile(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Response {
    tracing::info!("profile");

    match render_profile(&state, &session).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Failed to render profile: {:?}", e);
            error_page(&state).await
        }
    }
}

async fn render_profile(state: &AppState, session: &CurrentSession) -> GatewayResult<Response> {
    let template = state.templates.load(templates::PROFILE).await?;

    let user = &session.data.user;
    let tenant_id = user.subscription_tenant_id();

    let subscriptions = state
        .subscriptions
        .find_active_by_tenant(&tenant_id)
        .await?;
    if subscriptions.is_empty() {
        tracing::info!("No active subscription for tenant {:?}", tenant_id);
        return Ok(found("/no-subscription"));
    }

    let html = render(
        &template,
        &[
            ("displayName", user.display_name()),
            ("username", user.username_or_name()),
            ("tenantId", tenant_id.as_str()),
        ],
    );

    Ok(Html(html).into_response())
}

pub async fn no_subscription(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let session = current_session(&state, &headers)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Rendering no-subscription page without session: {:?}", e);
            None
        });
    let user = session.as_ref().map(|s| &s.data.user);

    let display_name = user.map(|u| u.display_name()).unwrap_or("User");
    let tenant_id = user
        .map(|u| u.subscription_tenant_id())
        .unwrap_or_default();

    match state.templates.load(templates::NO_SUBSCRIPTION).await {
        Ok(template) => Html(render(
            &template,
            &[("displayName", display_name), ("tenantId", tenant_id.as_str())],
        ))
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to render no-subscription page: {:?}", e);
            error_page(&state).await
        }
    }
}
