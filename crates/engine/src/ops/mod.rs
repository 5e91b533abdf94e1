use std::{fmt, sync::Arc, time::Duration};

use sea_orm::DatabaseConnection;

use crate::{EngineError, KeyedLocks, LockGuard, LockManager, LockStrategy, ResultEngine};

mod balances;
mod history;
mod transfer;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
///
/// `$on_db_err` wraps failures to open or commit the transaction.
macro_rules! with_tx {
    ($self:expr, $on_db_err:expr, |$tx:ident| $body:expr) => {{
        let $tx = sea_orm::TransactionTrait::begin(&$self.database)
            .await
            .map_err($on_db_err)?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await.map_err($on_db_err)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = $tx.rollback().await {
                    tracing::error!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    locks: Arc<dyn LockManager>,
    lock_strategy: LockStrategy,
    lock_timeout: Option<Duration>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn lock_strategy(&self) -> LockStrategy {
        self.lock_strategy
    }

    /// Acquire every key protecting a transfer between the two accounts.
    ///
    /// Keys come sorted from the strategy, so concurrent callers always take
    /// them in the same order. Guards already taken are released if a later
    /// key cannot be acquired.
    async fn lock_participants(
        &self,
        sender_id: &str,
        recipient_id: &str,
    ) -> ResultEngine<Vec<LockGuard>> {
        let pair = format!("[{sender_id} {recipient_id}]");
        let keys = self.lock_strategy.keys(sender_id, recipient_id);
        let mut guards = Vec::with_capacity(keys.len());

        for key in keys {
            let acquire = self.locks.acquire(key);
            let acquired = match self.lock_timeout {
                Some(limit) => match tokio::time::timeout(limit, acquire).await {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::LockAcquisitionFailed {
                        pair: pair.clone(),
                        reason: format!("timed out after {}ms", limit.as_millis()),
                    }),
                },
                None => acquire.await,
            };

            match acquired {
                Ok(guard) => guards.push(guard),
                Err(EngineError::LockAcquisitionFailed { reason, .. }) => {
                    return Err(EngineError::LockAcquisitionFailed { pair, reason });
                }
                Err(other) => return Err(other),
            }
        }

        Ok(guards)
    }

    /// Hand every guard back to the lock manager, last acquired first.
    ///
    /// Failures are logged and swallowed: the outcome of the guarded work is
    /// already decided and a committed write is never undone.
    async fn release_participants(&self, guards: Vec<LockGuard>) {
        for guard in guards.into_iter().rev() {
            let key = guard.key();
            if let Err(err) = self.locks.release(guard).await {
                tracing::error!(%key, "lock release failed: {err}");
            }
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("locks", &self.locks)
            .field("lock_strategy", &self.lock_strategy)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    locks: Option<Arc<dyn LockManager>>,
    lock_strategy: LockStrategy,
    lock_timeout: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Replace the in-process [`KeyedLocks`] registry.
    pub fn lock_manager(mut self, locks: impl LockManager + 'static) -> EngineBuilder {
        self.locks = Some(Arc::new(locks));
        self
    }

    pub fn lock_strategy(mut self, strategy: LockStrategy) -> EngineBuilder {
        self.lock_strategy = strategy;
        self
    }

    /// Bound the wait for each lock key. Unbounded when unset.
    pub fn lock_timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            locks: self
                .locks
                .unwrap_or_else(|| Arc::new(KeyedLocks::new())),
            lock_strategy: self.lock_strategy,
            lock_timeout: self.lock_timeout,
        })
    }
}
