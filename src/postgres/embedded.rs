use postgresql_embedded::{PostgreSQL, Settings, VersionReq};
use tracing::info;

use crate::error::StoreError;

/// A disposable PostgreSQL server running from a temporary data directory.
///
/// The server stops when this value is dropped.
pub struct EphemeralDatabase {
    postgresql: PostgreSQL,
    database: String,
}

impl std::fmt::Debug for EphemeralDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralDatabase")
            .field("port", &self.postgresql.settings().port)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

/// Map an image-style tag such as `16-alpine` or `15.4` to a server version requirement.
///
/// `latest` and an empty tag select the bundled default.
pub(crate) fn version_for_tag(tag: &str) -> Result<Option<VersionReq>, StoreError> {
    let tag = tag.trim();
    if tag.is_empty() || tag.eq_ignore_ascii_case("latest") {
        return Ok(None);
    }
    let numeric: String = tag
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let numeric = numeric.trim_end_matches('.');
    if numeric.is_empty() {
        return Err(StoreError::ConfigError(format!(
            "ephemeral database tag '{tag}' does not start with a version"
        )));
    }
    VersionReq::parse(&format!("={numeric}"))
        .map(Some)
        .map_err(|e| StoreError::ConfigError(format!("invalid ephemeral database tag '{tag}': {e}")))
}

fn embedded_error(stage: &str, e: &postgresql_embedded::Error) -> StoreError {
    StoreError::ConnectionError(format!("embedded postgres {stage} failed: {e}"))
}

impl EphemeralDatabase {
    /// Install (if needed) and start a server for `tag`, then create `database`.
    ///
    /// # Errors
    /// Returns `StoreError::ConfigError` for an unusable tag and
    /// `StoreError::ConnectionError` if the server cannot be set up or started.
    pub async fn start(tag: &str, database: &str) -> Result<Self, StoreError> {
        let mut settings = Settings::default();
        if let Some(version) = version_for_tag(tag)? {
            settings.version = version;
        }
        let mut postgresql = PostgreSQL::new(settings);
        postgresql
            .setup()
            .await
            .map_err(|e| embedded_error("setup", &e))?;
        postgresql
            .start()
            .await
            .map_err(|e| embedded_error("start", &e))?;
        let exists = postgresql
            .database_exists(database)
            .await
            .map_err(|e| embedded_error("database lookup", &e))?;
        if !exists {
            postgresql
                .create_database(database)
                .await
                .map_err(|e| embedded_error("create database", &e))?;
        }
        info!(
            tag,
            database,
            port = postgresql.settings().port,
            "started ephemeral postgres"
        );
        Ok(Self {
            postgresql,
            database: database.to_string(),
        })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.postgresql.settings().port
    }

    /// Connection settings for the running server.
    #[must_use]
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let settings = self.postgresql.settings();
        let mut config = tokio_postgres::Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.username)
            .password(settings.password.as_str())
            .dbname(&self.database);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_uses_bundled_version() {
        assert!(version_for_tag("latest").unwrap().is_none());
        assert!(version_for_tag("").unwrap().is_none());
    }

    #[test]
    fn image_suffix_is_ignored() {
        let req = version_for_tag("16-alpine").unwrap().unwrap();
        assert_eq!(req.to_string(), "=16");
        let req = version_for_tag("15.4").unwrap().unwrap();
        assert_eq!(req.to_string(), "=15.4");
    }

    #[test]
    fn non_numeric_tag_is_rejected() {
        assert!(matches!(
            version_for_tag("alpine"),
            Err(StoreError::ConfigError(_))
        ));
    }
}
