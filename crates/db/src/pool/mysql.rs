//! MySQL connector backed by `sqlx`.

use async_trait::async_trait;
use sqlx::Connection;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use tracing::debug;

use jxreport_shared::DatabaseConfig;

use super::Connector;

/// Opens raw `MySqlConnection`s from the database configuration.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    /// Creates a connector for the configured server and schema.
    #[must_use]
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .charset(&config.charset);
        Self { options }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlConnection;
    type Error = sqlx::Error;

    async fn connect(&self) -> Result<MySqlConnection, sqlx::Error> {
        MySqlConnection::connect_with(&self.options).await
    }

    async fn is_valid(&self, conn: &mut MySqlConnection) -> bool {
        conn.ping().await.is_ok()
    }

    async fn close(&self, conn: MySqlConnection) {
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error while closing MySQL connection");
        }
    }
}
