use axum::{middleware, routing::get, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{auth, handlers, AppState};

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/profile", get(handlers::profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route("/login", get(auth::login))
        .route("/redirect", get(auth::redirect))
        .route("/logout", get(auth::logout))
        .route("/no-subscription", get(handlers::no_subscription))
        .merge(protected)
        .nest_service("/public", ServeDir::new(&state.config.public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
