//! Auth-related types.

use serde::{Deserialize, Serialize};

/// Scopes requested at login and during the code exchange.
pub const LOGIN_SCOPES: [&str; 4] = ["openid", "profile", "email", "User.Read"];

/// Claims read from the identity provider's ID token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Tenant the user signed in from
    pub tid: Option<String>,
    /// Object id of the user within the tenant
    pub oid: Option<String>,
    pub sub: Option<String>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    pub email: Option<String>,
}

/// Signed-in account, as kept in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// `{oid}.{tid}`
    pub home_account_id: String,
    pub username: String,
    pub name: Option<String>,
    pub tenant_id: String,
    pub id_token_claims: IdTokenClaims,
}

impl Account {
    pub fn from_claims(claims: IdTokenClaims) -> Self {
        let tenant_id = claims.tid.clone().unwrap_or_default();
        let home_account_id = match (claims.oid.as_deref(), claims.tid.as_deref()) {
            (Some(oid), Some(tid)) => format!("{}.{}", oid, tid),
            _ => String::new(),
        };
        let username = claims
            .preferred_username
            .clone()
            .or_else(|| claims.email.clone())
            .unwrap_or_default();

        Account {
            home_account_id,
            username,
            name: claims.name.clone(),
            tenant_id,
            id_token_claims: claims,
        }
    }

    /// Tenant used as the subscription key: the `tid` claim, else the tenant
    /// half of the home account id, else empty.
    pub fn subscription_tenant_id(&self) -> String {
        if let Some(tid) = self.id_token_claims.tid.as_deref().filter(|t| !t.is_empty()) {
            return tid.to_string();
        }

        self.home_account_id
            .split('.')
            .nth(1)
            .unwrap_or_default()
            .to_string()
    }

    pub fn display_name(&self) -> &str {
        non_empty(self.name.as_deref())
            .or_else(|| non_empty(Some(&self.username)))
            .unwrap_or("User")
    }

    pub fn username_or_name(&self) -> &str {
        non_empty(Some(&self.username))
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or("")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Outcome of a successful authorization-code exchange.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    pub account: Account,
    pub access_token: String,
}
