use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing environment variable(s): {}", .0.join(", "))]
    MissingEnvironmentVariables(Vec<String>),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Column error: {0}")]
    ColumnError(String),

    #[error("Expected a value, but the query returned none")]
    MissingValue,

    #[error("Expected a generated key, but the statement returned none")]
    MissingGeneratedKey,
}

impl From<bb8::RunError<StoreError>> for StoreError {
    fn from(err: bb8::RunError<StoreError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => {
                StoreError::ConnectionError("timed out waiting for a pooled connection".into())
            }
        }
    }
}

impl From<native_tls::Error> for StoreError {
    fn from(err: native_tls::Error) -> Self {
        StoreError::TlsError(err.to_string())
    }
}
