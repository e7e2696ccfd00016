use bb8::PooledConnection;
use tracing::debug;

use crate::error::StoreError;

use super::config::PgManager;
use super::executor::impl_postgres_session;
use super::transaction::Tx;

/// A pooled connection in autocommit mode. Returned to the pool on drop.
pub struct PgConnection {
    conn: PooledConnection<'static, PgManager>,
}

impl PgConnection {
    pub(crate) fn new(conn: PooledConnection<'static, PgManager>) -> Self {
        Self { conn }
    }

    /// Open a transaction on this connection.
    ///
    /// The transaction borrows the connection until it is committed, rolled back or
    /// dropped; dropping it without committing rolls it back.
    ///
    /// # Errors
    /// Returns `StoreError::PostgresError` if `BEGIN` fails.
    pub async fn begin(&mut self) -> Result<Tx<'_>, StoreError> {
        let tx = self.conn.transaction().await?;
        debug!("transaction started");
        Ok(Tx::new(tx))
    }

    /// Run one or more statements without parameters, e.g. DDL.
    ///
    /// # Errors
    /// Returns `StoreError::PostgresError` on failure.
    pub async fn batch_execute(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.batch_execute(sql).await?;
        Ok(())
    }
}

impl_postgres_session!(PgConnection, |this| &*this.conn);
