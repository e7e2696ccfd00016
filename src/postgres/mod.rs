// PostgreSQL backend, split into:
// - config: bb8 connection manager and pool setup
// - tls: native-tls connector from certificate files
// - params / query: value conversion in both directions
// - executor: `Session` for connections and transactions
// - embedded: disposable server for tests (feature `ephemeral`)

pub mod config;
pub mod connection;
#[cfg(feature = "ephemeral")]
pub mod embedded;
mod executor;
pub mod params;
pub mod query;
pub mod tls;
pub mod transaction;

pub use config::PgManager;
pub use connection::PgConnection;
#[cfg(feature = "ephemeral")]
pub use embedded::EphemeralDatabase;
pub use params::Params;
pub use query::build_result_set;
pub use tls::TlsSettings;
pub use transaction::Tx;
