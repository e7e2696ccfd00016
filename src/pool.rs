#[cfg(feature = "ephemeral")]
use std::sync::Arc;

use bb8::Pool;
use futures_util::future::BoxFuture;
use tracing::warn;

use crate::config::{ResolvedConfiguration, Target};
use crate::error::StoreError;
#[cfg(feature = "ephemeral")]
use crate::postgres::EphemeralDatabase;
use crate::postgres::{PgConnection, PgManager, Tx};

/// Connection pool handed out by [`crate::DataSourceConfiguration::build`].
///
/// Cheap to clone; clones share the pool (and the ephemeral server, if any).
#[derive(Clone)]
pub struct StorePool {
    pool: Pool<PgManager>,
    #[cfg(feature = "ephemeral")]
    ephemeral: Option<Arc<EphemeralDatabase>>,
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.pool.state();
        let mut out = f.debug_struct("StorePool");
        out.field("connections", &state.connections)
            .field("idle_connections", &state.idle_connections);
        #[cfg(feature = "ephemeral")]
        out.field("ephemeral", &self.ephemeral);
        out.finish_non_exhaustive()
    }
}

impl StorePool {
    /// Open a pool for already-resolved settings.
    ///
    /// # Errors
    /// Returns `StoreError::TlsError` for unusable TLS material,
    /// `StoreError::ConfigError` for an ephemeral target without the `ephemeral`
    /// feature, and `StoreError::ConnectionError` if the pool cannot be created.
    pub async fn from_resolved(resolved: ResolvedConfiguration) -> Result<Self, StoreError> {
        let ResolvedConfiguration {
            target, tls, pool, ..
        } = resolved;

        #[cfg(feature = "ephemeral")]
        let mut ephemeral = None;

        let mut config = match target {
            Target::Driver(config) => config,
            #[cfg(feature = "ephemeral")]
            Target::Ephemeral { tag, database } => {
                let server = EphemeralDatabase::start(&tag, &database).await?;
                let config = server.pg_config();
                ephemeral = Some(Arc::new(server));
                config
            }
            #[cfg(not(feature = "ephemeral"))]
            Target::Ephemeral { tag, .. } => {
                return Err(StoreError::ConfigError(format!(
                    "ephemeral database '{tag}' requested but the `ephemeral` feature is disabled"
                )));
            }
        };

        let connector = match tls.connector()? {
            Some((mode, connector)) => {
                if tls.mode.is_some() {
                    config.ssl_mode(mode);
                }
                Some(connector)
            }
            None => None,
        };

        let manager = PgManager::new(config, connector, pool.connection_init_sql.clone());
        let pool = manager.build_pool(&pool).await?;
        Ok(Self {
            pool,
            #[cfg(feature = "ephemeral")]
            ephemeral,
        })
    }

    /// Check out a connection in autocommit mode.
    ///
    /// # Errors
    /// Returns `StoreError::ConnectionError` on checkout timeout, or the error from
    /// opening a new connection.
    pub async fn get_connection(&self) -> Result<PgConnection, StoreError> {
        let conn = self.pool.get_owned().await?;
        Ok(PgConnection::new(conn))
    }

    /// Run `callback` inside a transaction on a fresh connection.
    ///
    /// Commits when the callback returns `Ok`; rolls back and returns the callback's
    /// error otherwise. A failing rollback is logged, not reported.
    ///
    /// ```rust,no_run
    /// # use pg_store::prelude::*;
    /// # async fn demo(pool: StorePool) -> Result<(), StoreError> {
    /// let id = pool
    ///     .transaction(|tx| {
    ///         Box::pin(async move {
    ///             tx.update_and_return_generated_key(
    ///                 "INSERT INTO item (name) VALUES (:name)",
    ///                 &params! { "name" => "first" },
    ///             )
    ///             .await
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = id;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns the callback's error, or a `StoreError` from checkout, `BEGIN` or
    /// `COMMIT` converted into `E`.
    pub async fn transaction<R, E, F>(&self, callback: F) -> Result<R, E>
    where
        F: for<'t> FnOnce(&'t Tx<'_>) -> BoxFuture<'t, Result<R, E>>,
        E: From<StoreError>,
    {
        let mut conn = self.get_connection().await?;
        let tx = conn.begin().await?;
        let outcome = callback(&tx).await;
        finish(tx, outcome).await
    }

    /// Port of the ephemeral server backing this pool, if any.
    #[cfg(feature = "ephemeral")]
    #[must_use]
    pub fn ephemeral_port(&self) -> Option<u16> {
        self.ephemeral.as_ref().map(|server| server.port())
    }
}

/// Commit on `Ok`, roll back on `Err`, keeping the caller's error.
pub(crate) async fn finish<R, E>(tx: Tx<'_>, outcome: Result<R, E>) -> Result<R, E>
where
    E: From<StoreError>,
{
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "rollback after failed transaction body failed");
            }
            Err(err)
        }
    }
}
