use tokio_postgres::Transaction;
use tracing::debug;

use crate::error::StoreError;

use super::executor::impl_postgres_session;

/// An open transaction.
///
/// Stores built on a `Tx` borrow it, so none of them can outlive `commit` or
/// `rollback`, which consume the transaction.
pub struct Tx<'a> {
    tx: Transaction<'a>,
}

impl<'a> Tx<'a> {
    pub(crate) fn new(tx: Transaction<'a>) -> Self {
        Self { tx }
    }

    /// Execute a batch of SQL statements inside the transaction.
    ///
    /// # Errors
    /// Returns an error if execution fails.
    pub async fn batch_execute(&self, sql: &str) -> Result<(), StoreError> {
        self.tx.batch_execute(sql).await?;
        Ok(())
    }

    /// Commit the transaction.
    ///
    /// # Errors
    /// Returns an error if commit fails.
    pub async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        debug!("transaction committed");
        Ok(())
    }

    /// Roll back the transaction.
    ///
    /// # Errors
    /// Returns an error if rollback fails.
    pub async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        debug!("transaction rolled back");
        Ok(())
    }
}

impl_postgres_session!(Tx<'_>, |this| &this.tx);
