//! Connection factory abstraction.

use async_trait::async_trait;

/// Opens, checks and closes the raw connections a pool hands out.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type.
    type Connection: Send + 'static;

    /// Connect error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens a new connection.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Cheap liveness check run before an idle connection is reused.
    async fn is_valid(&self, conn: &mut Self::Connection) -> bool;

    /// Closes a connection gracefully.
    async fn close(&self, conn: Self::Connection);
}
