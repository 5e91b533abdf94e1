//! Double-entry transfer ledger.
//!
//! [`Engine`] moves money between accounts. Each transfer appends one
//! immutable [`Transaction`] and rewrites the sender's and recipient's
//! [`Balance`] inside a single database transaction, while advisory locks
//! from a [`LockManager`] keep overlapping transfers from interleaving.

pub use balances::Balance;
pub use error::EngineError;
pub use lock::{KeyedLocks, LockGuard, LockKey, LockManager, LockStrategy};
pub use money::Money;
pub use ops::{Engine, EngineBuilder};
pub use transactions::{Transaction, TransferRequest};

mod balances;
mod error;
mod lock;
mod money;
mod ops;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
