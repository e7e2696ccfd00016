#![doc = r#"
Named-parameter queries, layered pool configuration, and transaction-scoped store
contexts on top of `tokio-postgres`.

```rust,no_run
use pg_store::prelude::*;

# async fn demo() -> Result<(), StoreError> {
let pool = DataSourceConfiguration {
    env_var_prefix: Some("DB".into()),
    database: Some("app".into()),
    username: Some("app".into()),
    password: Some("secret".into()),
    ..DataSourceConfiguration::default()
}
.build()
.await?;

let conn = pool.get_connection().await?;
let names = conn
    .query_list(
        "SELECT name FROM item WHERE owner = :owner ORDER BY name",
        &params! { "owner" => "alice" },
        |row| row.value::<String>("name").map(Some),
    )
    .await?;
# let _ = names;
# Ok(())
# }
```
"#]

pub mod config;
pub mod context;
pub mod error;
pub mod page;
pub mod pool;
pub mod postgres;
pub mod prelude;
pub mod query;
pub mod results;
pub mod session;
pub mod translation;
pub mod types;

pub use config::{
    ConnectionSource, DEPLOYMENT_CONTEXT_VARIABLE, DataSourceConfiguration, PoolSettings,
    ResolvedConfiguration,
};
pub use context::{StoreContext, TransactionContextFactory};
pub use error::StoreError;
pub use page::{Page, UNKNOWN_TOTAL};
pub use pool::StorePool;
pub use postgres::{PgConnection, TlsSettings, Tx};
pub use query::{DEFAULT_TOTAL_LABEL, QueryOps, UpdateResult};
pub use results::{ResultSet, Row};
pub use session::Session;
pub use translation::NamedStatement;
pub use types::{FromRowValue, QueryParameters, RowValues};
