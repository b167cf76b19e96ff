//! Bearer tokens for Azure SQL.
//!
//! Deployed instances use the platform managed identity; developer machines
//! (`IS_LOCAL`) borrow the signed-in Azure CLI account. Tokens are fetched
//! fresh for every connection and never cached.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::fmt;

use crate::error::{GatewayError, GatewayResult};

/// Scope requested for Azure SQL access tokens.
pub const SQL_DATABASE_SCOPE: &str = "https://database.windows.net/.default";

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &token_preview(&self.token))
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// First 20 characters of a token, safe to log.
pub fn token_preview(token: &str) -> String {
    let prefix: String = token.chars().take(20).collect();
    format!("{}...", prefix)
}

/// Converts a `.default` scope into the v1 resource identifier expected by
/// IMDS and the Azure CLI.
pub fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> GatewayResult<AccessToken>;

    fn name(&self) -> &'static str;
}

/// Where the managed identity token endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedIdentityEndpoint {
    /// App Service / Functions local identity endpoint
    AppService { endpoint: String, header: String },
    /// Instance Metadata Service (VMs, AKS, Container Apps fallback)
    Imds,
}

impl ManagedIdentityEndpoint {
    pub fn from_env() -> Self {
        match (
            std::env::var("IDENTITY_ENDPOINT"),
            std::env::var("IDENTITY_HEADER"),
        ) {
            (Ok(endpoint), Ok(header)) if !endpoint.is_empty() && !header.is_empty() => {
                ManagedIdentityEndpoint::AppService { endpoint, header }
            }
            _ => ManagedIdentityEndpoint::Imds,
        }
    }
}

pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    endpoint: ManagedIdentityEndpoint,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    pub fn new(
        http: reqwest::Client,
        endpoint: ManagedIdentityEndpoint,
        client_id: Option<String>,
    ) -> Self {
        Self {
            http,
            endpoint,
            client_id,
        }
    }

    fn request(&self, resource: &str) -> reqwest::RequestBuilder {
        let mut params = vec![("resource", resource)];
        if let Some(client_id) = self.client_id.as_deref() {
            params.push(("client_id", client_id));
        }

        match &self.endpoint {
            ManagedIdentityEndpoint::AppService { endpoint, header } => {
                params.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(endpoint)
                    .query(&params)
                    .header("X-IDENTITY-HEADER", header)
            }
            ManagedIdentityEndpoint::Imds => {
                params.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(IMDS_ENDPOINT)
                    .query(&params)
                    .header("Metadata", "true")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    expires_on: Option<serde_json::Value>,
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> GatewayResult<AccessToken> {
        let response = self.request(scope_to_resource(scope)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::credential(format!(
                "managed identity endpoint returned {}: {}",
                status, body
            )));
        }

        let body: ManagedIdentityTokenResponse = response.json().await?;
        Ok(AccessToken {
            token: body.access_token,
            expires_on: body.expires_on.as_ref().and_then(parse_expires_on),
        })
    }

    fn name(&self) -> &'static str {
        "managed identity"
    }
}

/// `expires_on` arrives as epoch seconds, either as a JSON number or a string.
fn parse_expires_on(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    Utc.timestamp_opt(seconds, 0).single()
}

/// Token from the developer's `az login` session.
pub struct AzureCliCredential {
    program: String,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self {
            program: "az".to_string(),
        }
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

fn parse_cli_output(stdout: &[u8]) -> GatewayResult<AccessToken> {
    let parsed: CliTokenResponse = serde_json::from_slice(stdout).map_err(|e| {
        GatewayError::credential(format!("unexpected Azure CLI output: {}", e))
    })?;

    Ok(AccessToken {
        token: parsed.access_token,
        expires_on: parsed
            .expires_on
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    })
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, scope: &str) -> GatewayResult<AccessToken> {
        let output = tokio::process::Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--output",
                "json",
                "--resource",
                scope_to_resource(scope),
            ])
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GatewayError::credential(
                    "Azure CLI not found on PATH; install it or unset IS_LOCAL",
                ),
                _ => GatewayError::credential(format!("failed to run Azure CLI: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayError::credential(format!(
                "Azure CLI exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_cli_output(&output.stdout)
    }

    fn name(&self) -> &'static str {
        "Azure CLI"
    }
}

/// Picks the credential strategy from the `IS_LOCAL` flag on every request.
#[derive(Clone)]
pub struct CredentialProvider {
    is_local: bool,
    http: reqwest::Client,
    managed_identity_client_id: Option<String>,
}

impl CredentialProvider {
    pub fn new(
        is_local: bool,
        http: reqwest::Client,
        managed_identity_client_id: Option<String>,
    ) -> Self {
        Self {
            is_local,
            http,
            managed_identity_client_id,
        }
    }

    pub fn select(&self) -> Box<dyn TokenCredential> {
        if self.is_local {
            Box::new(AzureCliCredential::new())
        } else {
            Box::new(ManagedIdentityCredential::new(
                self.http.clone(),
                ManagedIdentityEndpoint::from_env(),
                self.managed_identity_client_id.clone(),
            ))
        }
    }

    pub async fn get_token(&self) -> GatewayResult<AccessToken> {
        let credential = self.select();
        let token = credential.get_token(SQL_DATABASE_SCOPE).await?;
        tracing::debug!(
            "Got token from {}: {}",
            credential.name(),
            token_preview(&token.token)
        );
        Ok(token)
    }
}
