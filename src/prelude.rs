//! Convenient imports for common functionality.
//!
//! This module re-exports the types and traits most callers need, including the
//! [`QueryOps`] extension trait that puts the query operations on every session.

pub use crate::config::{DataSourceConfiguration, PoolSettings};
pub use crate::context::{StoreContext, TransactionContextFactory};
pub use crate::error::StoreError;
pub use crate::page::{Page, UNKNOWN_TOTAL};
pub use crate::params;
pub use crate::pool::StorePool;
pub use crate::postgres::{PgConnection, Tx};
pub use crate::query::{QueryOps, UpdateResult};
pub use crate::results::{ResultSet, Row};
pub use crate::session::Session;
pub use crate::types::{FromRowValue, QueryParameters, RowValues};
