use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::GatewayConfig;
use crate::credential::{AccessToken, CredentialProvider};
use crate::error::GatewayResult;

pub type SqlClient = Client<Compat<TcpStream>>;

/// Opens Azure SQL connections authenticated with an Entra ID access token.
///
/// Every call to [`SqlConnector::get_connection`] negotiates a fresh token
/// and a fresh connection; callers hand the client back through
/// [`SqlConnector::release`] once they are done with it.
#[derive(Clone)]
pub struct SqlConnector {
    server: String,
    database: String,
    port: u16,
    log_identity: bool,
    credentials: CredentialProvider,
}

impl SqlConnector {
    pub fn new(config: &GatewayConfig, credentials: CredentialProvider) -> Self {
        Self {
            server: config.sql_server.clone(),
            database: config.sql_database.clone(),
            port: config.sql_port,
            log_identity: config.sql_log_identity,
            credentials,
        }
    }

    pub fn connection_config(&self, token: &AccessToken) -> Config {
        let mut config = Config::new();
        config.host(&self.server);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::aad_token(&token.token));
        config.encryption(EncryptionLevel::Required);
        config
    }

    pub async fn get_connection(&self) -> GatewayResult<SqlClient> {
        let token = self.credentials.get_token().await?;
        let mut client = connect(self.connection_config(&token)).await?;

        if self.log_identity {
            let row = client
                .simple_query("SELECT USER_NAME()")
                .await?
                .into_row()
                .await?;
            let user = row
                .as_ref()
                .and_then(|r| r.get::<&str, _>(0))
                .unwrap_or("<unknown>");
            tracing::info!("SQL sees user as: {}", user);
        }

        Ok(client)
    }

    pub async fn release(&self, client: SqlClient) {
        if let Err(e) = client.close().await {
            tracing::warn!("Failed to close SQL connection: {}", e);
        }
    }
}

async fn connect(config: Config) -> tiberius::Result<SqlClient> {
    let tcp = TcpStream::connect(config.get_addr()).await?;
    tcp.set_nodelay(true)?;

    match Client::connect(config.clone(), tcp.compat_write()).await {
        Ok(client) => Ok(client),
        // Azure SQL gateways may redirect to the node hosting the database.
        Err(tiberius::error::Error::Routing { host, port }) => {
            tracing::debug!("SQL gateway redirected connection to {}:{}", host, port);
            let mut config = config;
            config.host(&host);
            config.port(port);

            let tcp = TcpStream::connect(config.get_addr()).await?;
            tcp.set_nodelay(true)?;
            Client::connect(config, tcp.compat_write()).await
        }
        Err(e) => Err(e),
    }
}
