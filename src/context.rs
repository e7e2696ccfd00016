//! Transaction-scoped store contexts.
//!
//! An application describes, once, which stores exist inside a transaction by
//! implementing [`TransactionContextFactory`]. Every store in a context borrows the
//! same session, so they all see each other's uncommitted writes, and none of them
//! can outlive it.
//!
//! ```rust,no_run
//! use pg_store::prelude::*;
//!
//! struct ItemStore<'s, S> {
//!     session: &'s S,
//! }
//!
//! impl<S: Session> ItemStore<'_, S> {
//!     async fn count(&self) -> Result<i64, StoreError> {
//!         self.session
//!             .single("SELECT count(*) AS n FROM item", &params! {}, |row| {
//!                 Ok(row.int_or_null("n"))
//!             })
//!             .await
//!     }
//! }
//!
//! struct AppContext<'s, S> {
//!     items: ItemStore<'s, S>,
//! }
//!
//! struct AppContextFactory;
//!
//! impl<S: Session> TransactionContextFactory<S> for AppContextFactory {
//!     type Context<'s> = AppContext<'s, S> where S: 's;
//!
//!     fn create_transaction_context<'s>(&self, session: &'s S) -> AppContext<'s, S> {
//!         AppContext { items: ItemStore { session } }
//!     }
//! }
//!
//! # async fn demo(pool: StorePool) -> Result<(), StoreError> {
//! let store = StoreContext::new(pool, AppContextFactory);
//! let count = store
//!     .transaction(|store, tx| {
//!         Box::pin(async move { store.context(tx).items.count().await })
//!     })
//!     .await?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

use futures_util::future::BoxFuture;

use crate::error::StoreError;
use crate::pool::{StorePool, finish};
use crate::postgres::Tx;
use crate::session::Session;

/// Builds an application-defined bundle of stores bound to one session.
///
/// Implementations only wire references together; they perform no I/O.
pub trait TransactionContextFactory<S: Session> {
    type Context<'s>
    where
        S: 's;

    fn create_transaction_context<'s>(&self, session: &'s S) -> Self::Context<'s>;
}

/// A pool paired with the factory for the contexts opened on it.
#[derive(Debug, Clone)]
pub struct StoreContext<F> {
    pool: StorePool,
    factory: F,
}

impl<F> StoreContext<F> {
    #[must_use]
    pub fn new(pool: StorePool, factory: F) -> Self {
        Self { pool, factory }
    }

    #[must_use]
    pub fn pool(&self) -> &StorePool {
        &self.pool
    }

    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Build a context bound to `session`.
    pub fn context<'s, S>(&self, session: &'s S) -> <F as TransactionContextFactory<S>>::Context<'s>
    where
        S: Session,
        F: TransactionContextFactory<S>,
    {
        self.factory.create_transaction_context(session)
    }

    /// Run `callback` in a transaction, handing it this store context and the open
    /// transaction to build contexts from. Commit and rollback follow
    /// [`StorePool::transaction`].
    ///
    /// # Errors
    /// Returns the callback's error, or a `StoreError` from checkout, `BEGIN` or
    /// `COMMIT` converted into `E`.
    pub async fn transaction<R, E, C>(&self, callback: C) -> Result<R, E>
    where
        C: for<'t> FnOnce(&'t Self, &'t Tx<'_>) -> BoxFuture<'t, Result<R, E>>,
        E: From<StoreError>,
    {
        let mut conn = self.pool.get_connection().await?;
        let tx = conn.begin().await?;
        let outcome = callback(self, &tx).await;
        finish(tx, outcome).await
    }
}
