use std::future::Future;
use std::time::Duration;

use bb8::{ManageConnection, Pool};
use postgres_native_tls::MakeTlsConnector;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::PoolSettings;
use crate::error::StoreError;

/// bb8 manager for Postgres connections.
///
/// Every new physical connection runs the pool's init SQL before it is handed out.
pub struct PgManager {
    pub(crate) config: tokio_postgres::Config,
    tls: Option<MakeTlsConnector>,
    init_sql: String,
}

impl PgManager {
    #[must_use]
    pub fn new(
        config: tokio_postgres::Config,
        tls: Option<MakeTlsConnector>,
        init_sql: impl Into<String>,
    ) -> Self {
        Self {
            config,
            tls,
            init_sql: init_sql.into(),
        }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `StoreError::ConnectionError` if the pool cannot be created.
    pub async fn build_pool(self, settings: &PoolSettings) -> Result<Pool<PgManager>, StoreError> {
        Pool::builder()
            .max_size(settings.max_size)
            .min_idle(settings.min_idle)
            .connection_timeout(Duration::from_millis(settings.connection_timeout_ms))
            .build(self)
            .await
            .map_err(|e| StoreError::ConnectionError(format!("postgres pool error: {e}")))
    }
}

async fn connect_with(
    config: tokio_postgres::Config,
    tls: Option<MakeTlsConnector>,
) -> Result<Client, StoreError> {
    let client = match tls {
        Some(tls) => {
            let (client, connection) = config.connect(tls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection closed with error");
                }
            });
            client
        }
        None => {
            let (client, connection) = config.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(error = %e, "postgres connection closed with error");
                }
            });
            client
        }
    };
    Ok(client)
}

impl ManageConnection for PgManager {
    type Connection = Client;
    type Error = StoreError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let config = self.config.clone();
        let tls = self.tls.clone();
        let init_sql = self.init_sql.clone();
        async move {
            debug!(
                hosts = ?config.get_hosts(),
                dbname = ?config.get_dbname(),
                tls = tls.is_some(),
                "opening postgres connection"
            );
            let client = connect_with(config, tls).await?;
            if !init_sql.is_empty() {
                client.batch_execute(&init_sql).await?;
            }
            Ok(client)
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            conn.simple_query("SELECT 1").await?;
            Ok(())
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}
