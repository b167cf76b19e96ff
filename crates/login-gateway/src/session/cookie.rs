//! Signed session cookies.
//!
//! The cookie value is an HS256 token whose only payload is the session id,
//! so a forged or expired cookie never reaches the session store.
//!
//! A second, short-lived cookie carries the OAuth `state` value between
//! `/login` and `/redirect`.

use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::SessionId;
use crate::config::GatewayConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionClaims {
    sid: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoginStateClaims {
    state: String,
    iat: i64,
    exp: i64,
}

/// Lifetime of the login state cookie.
const LOGIN_STATE_TTL_MINUTES: i64 = 10;

#[derive(Clone)]
pub struct SessionCookie {
    name: String,
    secret: String,
    ttl: Duration,
    secure: bool,
}

impl SessionCookie {
    pub fn new(
        name: impl Into<String>,
        secret: impl Into<String>,
        ttl: Duration,
        secure: bool,
    ) -> Self {
        Self {
            name: name.into(),
            secret: secret.into(),
            ttl,
            secure,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            config.session_cookie_name.clone(),
            config.session_secret.clone(),
            config.session_ttl(),
            config.cookie_secure,
        )
    }

    /// Name of the cookie holding the pending OAuth `state`.
    pub fn login_state_name(&self) -> String {
        format!("{}.state", self.name)
    }

    /// Sign a session id into a cookie value.
    pub fn sign(&self, id: &SessionId) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = SessionClaims {
            sid: id.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Verify a cookie value and return the session id it carries.
    pub fn verify(&self, value: &str) -> Result<SessionId, jsonwebtoken::errors::Error> {
        let data = decode::<SessionClaims>(
            value,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(SessionId::from(data.claims.sid))
    }

    /// Session id from the request's `Cookie` header, if present and valid.
    pub fn extract(&self, headers: &HeaderMap) -> Option<SessionId> {
        let value = cookie_value(headers, &self.name)?;
        match self.verify(&value) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!("Ignoring invalid session cookie: {}", e);
                None
            }
        }
    }

    /// `Set-Cookie` value holding the signed OAuth `state` for one login.
    pub fn build_login_state(&self, state: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let ttl = Duration::minutes(LOGIN_STATE_TTL_MINUTES);
        let now = Utc::now();
        let claims = LoginStateClaims {
            state: state.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        let value = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;

        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.login_state_name(),
            value,
            ttl.num_seconds(),
            self.secure_attr()
        ))
    }

    /// True when the request carries a valid login state cookie whose value
    /// equals `state`.
    pub fn verify_login_state(&self, headers: &HeaderMap, state: &str) -> bool {
        let Some(value) = cookie_value(headers, &self.login_state_name()) else {
            tracing::debug!("No login state cookie");
            return false;
        };

        match decode::<LoginStateClaims>(
            &value,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => !state.is_empty() && data.claims.state == state,
            Err(e) => {
                tracing::debug!("Ignoring invalid login state cookie: {}", e);
                false
            }
        }
    }

    /// `Set-Cookie` value removing the login state cookie.
    pub fn clear_login_state(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.login_state_name(),
            self.secure_attr()
        )
    }

    /// `Set-Cookie` value establishing the session.
    pub fn build(&self, id: &SessionId) -> Result<String, jsonwebtoken::errors::Error> {
        let value = self.sign(id)?;
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.name,
            value,
            self.ttl.num_seconds(),
            self.secure_attr()
        ))
    }

    /// `Set-Cookie` value removing the session cookie.
    pub fn clear(&self) -> String {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0{}",
            self.name,
            self.secure_attr()
        )
    }

    fn secure_attr(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for cookie_str in cookie_header.split(';') {
            if let Ok(cookie) = ::cookie::Cookie::parse(cookie_str.trim()) {
                if cookie.name() == name {
                    return Some(cookie.value().to_string());
                }
            }
        }
    }

    None
}
