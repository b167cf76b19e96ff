//! Unified error handling for the gateway.
//!
//! Handlers normally catch a `GatewayError`, log it and render the generic
//! error page themselves. The `IntoResponse` impl here is the fallback used
//! when even the error page cannot be produced.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Unified error type for gateway operations
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Authorization URL construction or code exchange failed
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// Transport failure talking to the identity provider or token endpoint
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No bearer token could be obtained for the database
    #[error("Credential error: {0}")]
    Credential(String),

    /// Database connection, authentication or query error
    #[error("Database error: {0}")]
    Database(#[from] tiberius::error::Error),

    /// Template file missing or unreadable
    #[error("Failed to load template {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Session store failure
    #[error("Session error: {0}")]
    Session(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn identity(message: impl Into<String>) -> Self {
        GatewayError::Identity(message.into())
    }

    pub fn credential(message: impl Into<String>) -> Self {
        GatewayError::Credential(message.into())
    }

    pub fn session(message: impl Into<String>) -> Self {
        GatewayError::Session(message.into())
    }

    pub fn template(name: &str, source: std::io::Error) -> Self {
        GatewayError::Template {
            name: name.to_string(),
            source,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        tracing::error!("Unhandled gateway error: {:?}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
