//! Layered data source configuration.
//!
//! Settings resolve from, in order of precedence: an explicit connection URL or
//! driver config, environment overrides keyed by a prefix, then static fields. An
//! ephemeral test database replaces the whole chain when requested.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tokio_postgres::config::Host;
use tracing::info;

use crate::error::StoreError;
use crate::pool::StorePool;
use crate::postgres::TlsSettings;

/// Environment variable naming the deployment context (cluster) the process runs in.
pub const DEPLOYMENT_CONTEXT_VARIABLE: &str = "NAIS_CLUSTER_NAME";

/// Contexts in which environment overrides are ignored.
const LOCAL_CONTEXTS: [&str; 2] = ["local", "test"];

const DEFAULT_EPHEMERAL_DATABASE: &str = "test";

/// Pool tuning passed to bb8.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    pub connection_timeout_ms: u64,
    /// Run on every new physical connection before first use.
    pub connection_init_sql: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: None,
            connection_timeout_ms: 30_000,
            connection_init_sql: "SET TIMEZONE TO 'UTC'".to_string(),
        }
    }
}

/// Connection settings as supplied by the application.
///
/// Consumed once by [`DataSourceConfiguration::build`].
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct DataSourceConfiguration {
    /// Enables `<PREFIX>_HOST`-style overrides outside local/test contexts.
    pub env_var_prefix: Option<String>,
    pub hostname: String,
    pub port: u16,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_root_cert: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_key: Option<String>,
    pub ssl_mode: Option<String>,
    /// `postgres://` URL or key/value connection string; bypasses field assembly.
    pub connection_url: Option<String>,
    /// Prebuilt driver configuration; bypasses field assembly.
    #[serde(skip)]
    pub pg_config: Option<tokio_postgres::Config>,
    /// Version tag of a disposable test server, e.g. `16-alpine`.
    pub ephemeral_tag: Option<String>,
    pub pool: PoolSettings,
}

impl Default for DataSourceConfiguration {
    fn default() -> Self {
        Self {
            env_var_prefix: None,
            hostname: "localhost".to_string(),
            port: 5432,
            database: None,
            username: None,
            password: None,
            ssl_root_cert: None,
            ssl_cert: None,
            ssl_key: None,
            ssl_mode: None,
            connection_url: None,
            pg_config: None,
            ephemeral_tag: None,
            pool: PoolSettings::default(),
        }
    }
}

impl fmt::Debug for DataSourceConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceConfiguration")
            .field("env_var_prefix", &self.env_var_prefix)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("ssl_mode", &self.ssl_mode)
            .field("connection_url", &self.connection_url.as_ref().map(|_| "<redacted>"))
            .field("pg_config", &self.pg_config.is_some())
            .field("ephemeral_tag", &self.ephemeral_tag)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Where the resolved settings came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    ConnectionUrl,
    PgConfig,
    Environment { prefix: String, context: String },
    StaticFields,
    Ephemeral { tag: String },
}

#[derive(Debug, Clone)]
pub(crate) enum Target {
    Driver(tokio_postgres::Config),
    Ephemeral { tag: String, database: String },
}

/// Settings after precedence has been applied, ready to open a pool.
#[derive(Debug, Clone)]
pub struct ResolvedConfiguration {
    source: ConnectionSource,
    pub(crate) target: Target,
    pub(crate) tls: TlsSettings,
    pub(crate) pool: PoolSettings,
}

impl ResolvedConfiguration {
    #[must_use]
    pub fn source(&self) -> &ConnectionSource {
        &self.source
    }

    /// First TCP host, if the target names one.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        match &self.target {
            Target::Driver(config) => config.get_hosts().iter().find_map(|host| match host {
                Host::Tcp(name) => Some(name.as_str()),
                #[allow(unreachable_patterns)]
                _ => None,
            }),
            Target::Ephemeral { .. } => None,
        }
    }

    #[must_use]
    pub fn port(&self) -> Option<u16> {
        match &self.target {
            Target::Driver(config) => Some(config.get_ports().first().copied().unwrap_or(5432)),
            Target::Ephemeral { .. } => None,
        }
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        match &self.target {
            Target::Driver(config) => config.get_dbname(),
            Target::Ephemeral { database, .. } => Some(database),
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match &self.target {
            Target::Driver(config) => config.get_user(),
            Target::Ephemeral { .. } => None,
        }
    }

    #[must_use]
    pub fn tls(&self) -> &TlsSettings {
        &self.tls
    }

    #[must_use]
    pub fn pool_settings(&self) -> &PoolSettings {
        &self.pool
    }
}

/// Fields that environment overrides replace.
struct Fields {
    hostname: String,
    port: u16,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    tls: TlsSettings,
}

impl DataSourceConfiguration {
    /// Configuration for a disposable test server of the given version tag.
    ///
    /// The database is named `test` unless [`DataSourceConfiguration::database`] is set.
    #[must_use]
    pub fn ephemeral(tag: impl Into<String>) -> Self {
        Self {
            ephemeral_tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Resolve against the process environment and open a pool.
    ///
    /// # Errors
    /// Returns configuration errors from [`DataSourceConfiguration::resolve_with`] and
    /// TLS or connection errors from opening the pool.
    pub async fn build(self) -> Result<StorePool, StoreError> {
        let resolved = self.resolve_with(process_env)?;
        StorePool::from_resolved(resolved).await
    }

    /// Apply precedence using `env` for every environment lookup.
    ///
    /// # Errors
    /// - `StoreError::MissingEnvironmentVariables` listing every absent required override
    /// - `StoreError::ConfigError` for a bad port, URL, or missing static field
    pub fn resolve_with<E>(&self, env: E) -> Result<ResolvedConfiguration, StoreError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let resolved = self.resolve_source(&env)?;
        match resolved.source() {
            ConnectionSource::Ephemeral { tag } => info!(
                tag = %tag,
                database = resolved.database().unwrap_or_default(),
                "using ephemeral database"
            ),
            ConnectionSource::Environment { prefix, context } => info!(
                prefix = %prefix,
                context = %context,
                host = resolved.host().unwrap_or_default(),
                database = resolved.database().unwrap_or_default(),
                "overriding data source configuration from environment"
            ),
            other => info!(
                source = ?other,
                host = resolved.host().unwrap_or_default(),
                database = resolved.database().unwrap_or_default(),
                "resolved data source configuration"
            ),
        }
        Ok(resolved)
    }

    fn resolve_source<E>(&self, env: &E) -> Result<ResolvedConfiguration, StoreError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let static_tls = TlsSettings {
            root_cert: self.ssl_root_cert.clone(),
            cert: self.ssl_cert.clone(),
            key: self.ssl_key.clone(),
            mode: self.ssl_mode.clone(),
        };

        if let Some(tag) = &self.ephemeral_tag {
            let database = self
                .database
                .clone()
                .unwrap_or_else(|| DEFAULT_EPHEMERAL_DATABASE.to_string());
            return Ok(self.resolved(
                ConnectionSource::Ephemeral { tag: tag.clone() },
                Target::Ephemeral {
                    tag: tag.clone(),
                    database,
                },
                TlsSettings::default(),
            ));
        }

        if let Some(url) = &self.connection_url {
            let config = tokio_postgres::Config::from_str(url)
                .map_err(|e| StoreError::ConfigError(format!("invalid connection URL: {e}")))?;
            return Ok(self.resolved(ConnectionSource::ConnectionUrl, Target::Driver(config), static_tls));
        }

        if let Some(config) = &self.pg_config {
            return Ok(self.resolved(
                ConnectionSource::PgConfig,
                Target::Driver(config.clone()),
                static_tls,
            ));
        }

        let static_fields = Fields {
            hostname: self.hostname.clone(),
            port: self.port,
            database: self.database.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            tls: static_tls,
        };

        let context = env(DEPLOYMENT_CONTEXT_VARIABLE).unwrap_or_else(|| "local".to_string());
        let (source, fields) = match &self.env_var_prefix {
            Some(prefix) if !LOCAL_CONTEXTS.contains(&context.as_str()) => {
                let fields = env_overrides(prefix, env, static_fields.tls)?;
                (
                    ConnectionSource::Environment {
                        prefix: prefix.clone(),
                        context,
                    },
                    fields,
                )
            }
            _ => (ConnectionSource::StaticFields, static_fields),
        };

        let config = driver_config(&fields)?;
        Ok(self.resolved(source, Target::Driver(config), fields.tls))
    }

    fn resolved(&self, source: ConnectionSource, target: Target, tls: TlsSettings) -> ResolvedConfiguration {
        ResolvedConfiguration {
            source,
            target,
            tls,
            pool: self.pool.clone(),
        }
    }
}

/// Read `<prefix>_<suffix>` overrides; TLS overrides fall back to `static_tls`.
fn env_overrides<E>(prefix: &str, env: &E, static_tls: TlsSettings) -> Result<Fields, StoreError>
where
    E: Fn(&str) -> Option<String>,
{
    let name = |suffix: &str| format!("{prefix}_{suffix}");
    let mut missing = Vec::new();
    let mut required = |suffix: &str| {
        let key = name(suffix);
        let value = env(&key);
        if value.is_none() {
            missing.push(key);
        }
        value
    };
    let hostname = required("HOST");
    let port = required("PORT");
    let database = required("DATABASE");
    let username = required("USERNAME");
    let password = required("PASSWORD");
    if !missing.is_empty() {
        return Err(StoreError::MissingEnvironmentVariables(missing));
    }
    let (Some(hostname), Some(port)) = (hostname, port) else {
        return Err(StoreError::MissingEnvironmentVariables(vec![name("HOST")]));
    };
    let port = port.trim().parse::<u16>().map_err(|e| {
        StoreError::ConfigError(format!("{} is not a valid port: {e}", name("PORT")))
    })?;

    let tls = TlsSettings {
        root_cert: env(&name("SSLROOTCERT")).or(static_tls.root_cert),
        cert: env(&name("SSLCERT")).or(static_tls.cert),
        key: env(&name("SSLKEY_PK8")).or(static_tls.key),
        mode: env(&name("SSLMODE")).or(static_tls.mode),
    };

    Ok(Fields {
        hostname,
        port,
        database,
        username,
        password,
        tls,
    })
}

fn driver_config(fields: &Fields) -> Result<tokio_postgres::Config, StoreError> {
    let missing: Vec<&str> = [
        ("database", fields.database.is_none()),
        ("username", fields.username.is_none()),
        ("password", fields.password.is_none()),
    ]
    .into_iter()
    .filter_map(|(field, absent)| absent.then_some(field))
    .collect();
    if !missing.is_empty() {
        return Err(StoreError::ConfigError(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )));
    }

    let mut config = tokio_postgres::Config::new();
    config.host(&fields.hostname).port(fields.port);
    if let Some(database) = &fields.database {
        config.dbname(database);
    }
    if let Some(username) = &fields.username {
        config.user(username);
    }
    if let Some(password) = &fields.password {
        config.password(password.as_str());
    }
    Ok(config)
}

/// Environment lookup used by [`DataSourceConfiguration::build`].
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> DataSourceConfiguration {
        DataSourceConfiguration {
            database: Some("app".into()),
            username: Some("u".into()),
            password: Some("p".into()),
            ..DataSourceConfiguration::default()
        }
    }

    #[test]
    fn defaults_match_local_postgres() {
        let config = DataSourceConfiguration::default();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.pool.connection_init_sql, "SET TIMEZONE TO 'UTC'");
    }

    #[test]
    fn missing_static_fields_are_named() {
        let err = DataSourceConfiguration::default()
            .resolve_with(|_| None)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("database"));
        assert!(message.contains("username"));
        assert!(message.contains("password"));
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", fields());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("\"p\""));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: DataSourceConfiguration =
            serde_json::from_value(serde_json::json!({ "database": "app", "pool": { "max_size": 4 } }))
                .unwrap();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.database.as_deref(), Some("app"));
        assert_eq!(config.pool.max_size, 4);
        assert_eq!(config.pool.connection_timeout_ms, 30_000);
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let config = DataSourceConfiguration {
            env_var_prefix: Some("DB".into()),
            ..fields()
        };
        let err = config
            .resolve_with(|name| match name {
                DEPLOYMENT_CONTEXT_VARIABLE => Some("prod-gcp".into()),
                "DB_PORT" => Some("not-a-port".into()),
                _ => Some("x".into()),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::ConfigError(ref m) if m.contains("DB_PORT")));
    }
}
