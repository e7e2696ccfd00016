//! The session abstraction the query operations run against.

use std::future::Future;

use crate::error::StoreError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// An active database session: a pooled connection in autocommit mode, or an open
/// transaction.
///
/// Statements reaching a session are already rewritten to positional `$N`
/// placeholders with their values in order. A session never commits, rolls back
/// or closes itself on behalf of the query layer; that stays with its owner.
pub trait Session: Send + Sync {
    /// Run a statement and collect its rows.
    fn select(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> impl Future<Output = Result<ResultSet, StoreError>> + Send;

    /// Run a statement and return the number of affected rows.
    fn dml(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Run one statement once per parameter list, returning affected-row counts in
    /// input order.
    ///
    /// The default runs the items one after another; drivers that can pipeline
    /// override it.
    #[allow(clippy::manual_async_fn)]
    fn dml_batch(
        &self,
        sql: &str,
        batch: &[Vec<RowValues>],
    ) -> impl Future<Output = Result<Vec<u64>, StoreError>> + Send {
        async move {
            let mut counts = Vec::with_capacity(batch.len());
            for params in batch {
                counts.push(self.dml(sql, params).await?);
            }
            Ok(counts)
        }
    }

    /// Run one row-returning statement once per parameter list, returning the
    /// result sets in input order.
    #[allow(clippy::manual_async_fn)]
    fn select_batch(
        &self,
        sql: &str,
        batch: &[Vec<RowValues>],
    ) -> impl Future<Output = Result<Vec<ResultSet>, StoreError>> + Send {
        async move {
            let mut results = Vec::with_capacity(batch.len());
            for params in batch {
                results.push(self.select(sql, params).await?);
            }
            Ok(results)
        }
    }
}

impl<S: Session> Session for &S {
    fn select(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> impl Future<Output = Result<ResultSet, StoreError>> + Send {
        (**self).select(sql, params)
    }

    fn dml(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        (**self).dml(sql, params)
    }

    fn dml_batch(
        &self,
        sql: &str,
        batch: &[Vec<RowValues>],
    ) -> impl Future<Output = Result<Vec<u64>, StoreError>> + Send {
        (**self).dml_batch(sql, batch)
    }

    fn select_batch(
        &self,
        sql: &str,
        batch: &[Vec<RowValues>],
    ) -> impl Future<Output = Result<Vec<ResultSet>, StoreError>> + Send {
        (**self).select_batch(sql, batch)
    }
}
