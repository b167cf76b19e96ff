use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_SESSION_SECRET: &str = "default_secret";

/// Gateway configuration.
///
/// Every option can be given as a flag or through the environment; a `.env`
/// file is loaded before parsing.
#[derive(Debug, Clone, Parser)]
#[command(name = "login-gateway")]
#[command(about = "Login gateway that gates a profile page on an active tenant subscription")]
pub struct GatewayConfig {
    /// Application (client) id of the app registration.
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: String,

    /// Client secret of the app registration.
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Tenant used to build the authority URL.
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: String,

    #[arg(
        long,
        env = "AZURE_AUTHORITY_HOST",
        default_value = "https://login.microsoftonline.com"
    )]
    pub authority_host: String,

    /// Public base URL of the gateway, used for the OAuth redirect URI and
    /// as the post-logout destination.
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Key used to sign session cookies.
    #[arg(
        long,
        env = "SESSION_SECRET",
        default_value = DEFAULT_SESSION_SECRET,
        hide_env_values = true
    )]
    pub session_secret: String,

    /// Session lifetime in hours, at most one year.
    #[arg(
        long,
        env = "SESSION_TTL_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=8760)
    )]
    pub session_ttl_hours: i64,

    #[arg(long, env = "SESSION_COOKIE_NAME", default_value = "gateway.sid")]
    pub session_cookie_name: String,

    /// Mark the session cookie `Secure` (requires HTTPS).
    #[arg(long, env = "COOKIE_SECURE")]
    pub cookie_secure: bool,

    /// Azure SQL server host, e.g. my-saas-db.database.windows.net
    #[arg(long, env = "AZURE_SQL_SERVER")]
    pub sql_server: String,

    #[arg(long, env = "AZURE_SQL_DATABASE")]
    pub sql_database: String,

    #[arg(long, env = "AZURE_SQL_PORT", default_value_t = 1433)]
    pub sql_port: u16,

    /// Run `SELECT USER_NAME()` after every connect and log the result.
    #[arg(long, env = "SQL_LOG_IDENTITY")]
    pub sql_log_identity: bool,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Use the Azure CLI credential instead of managed identity.
    #[arg(long, env = "IS_LOCAL")]
    pub is_local: bool,

    /// Client id of a user-assigned managed identity.
    #[arg(long, env = "MANAGED_IDENTITY_CLIENT_ID")]
    pub managed_identity_client_id: Option<String>,

    #[arg(long, env = "VIEWS_DIR", default_value = "views")]
    pub views_dir: PathBuf,

    #[arg(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,
}

impl GatewayConfig {
    pub fn base_url(&self) -> String {
        match self.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.port),
        }
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/redirect", self.base_url())
    }

    pub fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }

    pub fn uses_default_session_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> GatewayConfig {
    GatewayConfig::try_parse_from([
        "login-gateway",
        "--client-id",
        "client-123",
        "--client-secret",
        "secret",
        "--tenant-id",
        "common",
        "--authority-host",
        "https://login.microsoftonline.com",
        "--base-url",
        "https://gateway.example.com/",
        "--session-secret",
        "test-secret-key-for-testing-only",
        "--sql-server",
        "db.example.net",
        "--sql-database",
        "saas",
        "--views-dir",
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../views"),
        "--public-dir",
        concat!(env!("CARGO_MANIFEST_DIR"), "/../../public"),
    ])
    .expect("test config should parse")
}
