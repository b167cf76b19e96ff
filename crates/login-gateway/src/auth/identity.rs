//! Identity provider client for the Microsoft identity platform (v2.0
//! endpoints).

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

use super::types::{Account, AuthenticationResult, IdTokenClaims};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL of the authorization endpoint the browser is sent to.
    async fn auth_code_url(
        &self,
        scopes: &[&str],
        redirect_uri: &str,
        state: &str,
    ) -> GatewayResult<String>;

    /// Redeem an authorization code for tokens and the signed-in account.
    async fn acquire_token_by_code(
        &self,
        code: &str,
        scopes: &[&str],
        redirect_uri: &str,
    ) -> GatewayResult<AuthenticationResult>;

    /// Provider sign-out URL that returns the browser to `post_logout_redirect_uri`.
    fn logout_url(&self, post_logout_redirect_uri: &str) -> String;
}

/// Confidential client against `{authority}/oauth2/v2.0/*`.
pub struct MicrosoftIdentity {
    http: reqwest::Client,
    authority: String,
    client_id: String,
    client_secret: String,
}

impl MicrosoftIdentity {
    pub fn new(
        http: reqwest::Client,
        authority: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority: authority.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn from_config(config: &GatewayConfig, http: reqwest::Client) -> Self {
        Self::new(
            http,
            config.authority(),
            config.client_id.clone(),
            config.client_secret.clone(),
        )
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/oauth2/v2.0/{}", self.authority, name)
    }

    /// Read the claims of an ID token received directly from the token
    /// endpoint over TLS. The audience must be this client and the token
    /// must not be expired.
    pub fn decode_id_token(&self, id_token: &str) -> GatewayResult<IdTokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.set_audience(&[self.client_id.as_str()]);

        decode::<IdTokenClaims>(id_token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| GatewayError::identity(format!("invalid id_token: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[async_trait]
impl IdentityProvider for MicrosoftIdentity {
    async fn auth_code_url(
        &self,
        scopes: &[&str],
        redirect_uri: &str,
        state: &str,
    ) -> GatewayResult<String> {
        if self.client_id.is_empty() {
            return Err(GatewayError::identity("client id is not configured"));
        }

        let scope = scopes.join(" ");
        let params = [
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("response_mode", "query"),
            ("scope", scope.as_str()),
            ("state", state),
        ];

        let url = reqwest::Url::parse_with_params(&self.endpoint("authorize"), &params)
            .map_err(|e| GatewayError::identity(format!("invalid authority URL: {}", e)))?;

        Ok(url.to_string())
    }

    async fn acquire_token_by_code(
        &self,
        code: &str,
        scopes: &[&str],
        redirect_uri: &str,
    ) -> GatewayResult<AuthenticationResult> {
        let scope = scopes.join(" ");
        let response = self
            .http
            .post(self.endpoint("token"))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => format!(
                    "{} ({})",
                    err.error,
                    err.error_description.unwrap_or_default()
                ),
                Err(_) => body,
            };
            return Err(GatewayError::identity(format!(
                "token exchange failed with {}: {}",
                status, message
            )));
        }

        let tokens: TokenResponse = response.json().await?;
        let id_token = tokens
            .id_token
            .ok_or_else(|| GatewayError::identity("token response did not include an id_token"))?;
        let claims = self.decode_id_token(&id_token)?;

        Ok(AuthenticationResult {
            account: Account::from_claims(claims),
            access_token: tokens.access_token,
        })
    }

    fn logout_url(&self, post_logout_redirect_uri: &str) -> String {
        format!(
            "{}?post_logout_redirect_uri={}",
            self.endpoint("logout"),
            urlencoding::encode(post_logout_redirect_uri)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::types::LOGIN_SCOPES;
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn identity() -> MicrosoftIdentity {
        MicrosoftIdentity::new(
            reqwest::Client::new(),
            "https://login.microsoftonline.com/tenant-1",
            "client-123",
            "secret",
        )
    }

    fn id_token(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"unrelated-signing-key"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_auth_code_url() {
        let url = identity()
            .auth_code_url(&LOGIN_SCOPES, "https://gateway.example.com/redirect", "abc")
            .await
            .expect("should build url");

        assert!(url.starts_with(
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/authorize?"
        ));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fgateway.example.com%2Fredirect"));
        assert!(url.contains("scope=openid+profile+email+User.Read"));
        assert!(url.contains("state=abc"));
    }

    #[tokio::test]
    async fn test_auth_code_url_requires_client_id() {
        let identity = MicrosoftIdentity::new(
            reqwest::Client::new(),
            "https://login.microsoftonline.com/tenant-1",
            "",
            "secret",
        );
        let result = identity
            .auth_code_url(&LOGIN_SCOPES, "https://gateway.example.com/redirect", "abc")
            .await;
        assert!(matches!(result, Err(GatewayError::Identity(_))));
    }

    #[tokio::test]
    async fn test_auth_code_url_rejects_bad_authority() {
        let identity = MicrosoftIdentity::new(reqwest::Client::new(), "not a url", "id", "s");
        let result = identity.auth_code_url(&LOGIN_SCOPES, "x", "abc").await;
        assert!(matches!(result, Err(GatewayError::Identity(_))));
    }

    #[test]
    fn test_logout_url_encodes_base_url() {
        assert_eq!(
            identity().logout_url("https://gateway.example.com"),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/logout\
             ?post_logout_redirect_uri=https%3A%2F%2Fgateway.example.com"
        );
    }

    #[test]
    fn test_decode_id_token_claims() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = id_token(json!({
            "aud": "client-123",
            "exp": exp,
            "tid": "tenant-1",
            "oid": "oid-1",
            "name": "Alice",
            "preferred_username": "alice@contoso.com",
            "ver": "2.0"
        }));

        let claims = identity().decode_id_token(&token).expect("should decode");
        assert_eq!(claims.tid.as_deref(), Some("tenant-1"));
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        assert_eq!(claims.preferred_username.as_deref(), Some("alice@contoso.com"));
    }

    #[test]
    fn test_decode_id_token_rejects_other_audience() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let token = id_token(json!({ "aud": "someone-else", "exp": exp, "tid": "t" }));
        assert!(identity().decode_id_token(&token).is_err());
    }

    #[test]
    fn test_decode_id_token_rejects_expired() {
        let exp = (Utc::now() - Duration::hours(2)).timestamp();
        let token = id_token(json!({ "aud": "client-123", "exp": exp, "tid": "t" }));
        assert!(identity().decode_id_token(&token).is_err());
    }
}
