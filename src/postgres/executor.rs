//! `Session` implementations shared by pooled connections and transactions.
//!
//! Both `tokio_postgres::Client` and `tokio_postgres::Transaction` expose the same
//! `prepare`/`query`/`execute` surface without a common `Send`-friendly trait, so
//! the implementation is stamped out per type.

/// Implement [`crate::Session`] for a wrapper type given an expression that yields
/// the underlying client or transaction from `self`.
///
/// Batches prepare once and pipeline one execution per parameter list; results keep
/// input order.
macro_rules! impl_postgres_session {
    ($ty:ty, |$this:ident| $client:expr) => {
        impl $crate::session::Session for $ty {
            #[allow(clippy::manual_async_fn)]
            fn select(
                &self,
                sql: &str,
                params: &[$crate::types::RowValues],
            ) -> impl std::future::Future<
                Output = Result<$crate::results::ResultSet, $crate::error::StoreError>,
            > + Send {
                async move {
                    let $this = self;
                    let client = $client;
                    let stmt = client.prepare(sql).await?;
                    let converted = $crate::postgres::Params::convert(params);
                    let rows = client.query(&stmt, converted.as_refs()).await?;
                    $crate::postgres::build_result_set(&stmt, &rows)
                }
            }

            #[allow(clippy::manual_async_fn)]
            fn dml(
                &self,
                sql: &str,
                params: &[$crate::types::RowValues],
            ) -> impl std::future::Future<Output = Result<u64, $crate::error::StoreError>> + Send
            {
                async move {
                    let $this = self;
                    let client = $client;
                    let stmt = client.prepare(sql).await?;
                    let converted = $crate::postgres::Params::convert(params);
                    Ok(client.execute(&stmt, converted.as_refs()).await?)
                }
            }

            #[allow(clippy::manual_async_fn)]
            fn dml_batch(
                &self,
                sql: &str,
                batch: &[Vec<$crate::types::RowValues>],
            ) -> impl std::future::Future<
                Output = Result<Vec<u64>, $crate::error::StoreError>,
            > + Send {
                async move {
                    if batch.is_empty() {
                        return Ok(Vec::new());
                    }
                    let $this = self;
                    let client = $client;
                    let stmt = client.prepare(sql).await?;
                    let stmt = &stmt;
                    let converted: Vec<_> = batch
                        .iter()
                        .map(|params| $crate::postgres::Params::convert(params))
                        .collect();
                    let executions = converted.iter().map(|params| async move {
                        client
                            .execute(stmt, params.as_refs())
                            .await
                            .map_err($crate::error::StoreError::from)
                    });
                    futures_util::future::try_join_all(executions).await
                }
            }

            #[allow(clippy::manual_async_fn)]
            fn select_batch(
                &self,
                sql: &str,
                batch: &[Vec<$crate::types::RowValues>],
            ) -> impl std::future::Future<
                Output = Result<Vec<$crate::results::ResultSet>, $crate::error::StoreError>,
            > + Send {
                async move {
                    if batch.is_empty() {
                        return Ok(Vec::new());
                    }
                    let $this = self;
                    let client = $client;
                    let stmt = client.prepare(sql).await?;
                    let stmt = &stmt;
                    let converted: Vec<_> = batch
                        .iter()
                        .map(|params| $crate::postgres::Params::convert(params))
                        .collect();
                    let queries = converted.iter().map(|params| async move {
                        let rows = client.query(stmt, params.as_refs()).await?;
                        $crate::postgres::build_result_set(stmt, &rows)
                    });
                    futures_util::future::try_join_all(queries).await
                }
            }
        }
    };
}

pub(crate) use impl_postgres_session;
