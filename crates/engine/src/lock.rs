//! Advisory locking for transfers.
//!
//! Every transfer holds one or more [`LockKey`]s while it reads and rewrites
//! balances. Keys are derived from the participants so that two transfers
//! touching the same accounts always contend for the same slot, whichever
//! direction the money moves in.
//!
//! The [`LockManager`] trait is the seam: [`KeyedLocks`] serializes callers
//! inside one process, a distributed or database-backed manager can be
//! plugged in through [`EngineBuilder::lock_manager`].
//!
//! [`EngineBuilder::lock_manager`]: crate::EngineBuilder::lock_manager

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Integer key naming one lock slot.
///
/// Distinct inputs may hash to the same key. That only makes unrelated
/// transfers wait for each other; it never lets related ones interleave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockKey(u32);

impl LockKey {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Key shared by every transfer between `a` and `b`, in either direction.
    ///
    /// The pair is sorted and rendered as `"[low high]"` before hashing.
    #[must_use]
    pub fn for_pair(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(fnv1a_32(format!("[{low} {high}]").as_bytes()))
    }

    /// Key owned by a single account.
    #[must_use]
    pub fn for_account(account_id: &str) -> Self {
        Self(fnv1a_32(format!("[{account_id}]").as_bytes()))
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// How a transfer turns its participants into lock keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// One key for the unordered `(sender, recipient)` pair.
    ///
    /// Transfers from one sender to two different recipients take different
    /// keys and may run side by side.
    #[default]
    Pair,
    /// One key per participant, acquired in ascending key order.
    ///
    /// Any two transfers sharing an account are serialized.
    PerAccount,
}

impl LockStrategy {
    /// Keys to acquire, sorted and without duplicates.
    #[must_use]
    pub fn keys(self, sender_id: &str, recipient_id: &str) -> Vec<LockKey> {
        let mut keys = match self {
            Self::Pair => vec![LockKey::for_pair(sender_id, recipient_id)],
            Self::PerAccount => vec![
                LockKey::for_account(sender_id),
                LockKey::for_account(recipient_id),
            ],
        };
        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

/// Proof of holding one lock slot. The slot is released when the guard drops.
pub struct LockGuard {
    key: LockKey,
    _held: Box<dyn Send + Sync>,
}

impl LockGuard {
    /// Wrap whatever keeps the slot held for a [`LockManager`] implementation.
    pub fn new(key: LockKey, held: impl Send + Sync + 'static) -> Self {
        Self {
            key,
            _held: Box::new(held),
        }
    }

    #[must_use]
    pub fn key(&self) -> LockKey {
        self.key
    }

    pub fn release(self) {
        tracing::debug!(key = %self.key, "lock released");
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("key", &self.key).finish()
    }
}

/// Advisory mutual exclusion keyed by integers.
///
/// `acquire` suspends until the slot is free. Dropping the returned future
/// before it resolves must leave the slot untouched.
#[async_trait]
pub trait LockManager: Send + Sync + fmt::Debug {
    async fn acquire(&self, key: LockKey) -> ResultEngine<LockGuard>;

    /// Give a slot back on the manager that handed it out.
    ///
    /// The default drops the guard. Managers whose unlock is a remote call
    /// report its failure as [`EngineError::LockReleaseFailed`]; the guard
    /// is consumed either way.
    async fn release(&self, guard: LockGuard) -> ResultEngine<()> {
        guard.release();
        Ok(())
    }
}

type Slot = Arc<tokio::sync::Mutex<()>>;

/// In-process registry of keyed async mutexes.
///
/// Slots are created on first use and pruned once nobody holds or waits on
/// them, so the registry only grows with the number of in-flight transfers.
#[derive(Clone, Debug, Default)]
pub struct KeyedLocks {
    slots: Arc<Mutex<HashMap<LockKey, Slot>>>,
}

impl KeyedLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently held or awaited.
    pub fn active(&self) -> usize {
        match self.slots.lock() {
            Ok(mut slots) => {
                prune(&mut slots);
                slots.len()
            }
            Err(_) => 0,
        }
    }

    fn slot(&self, key: LockKey) -> ResultEngine<Slot> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| EngineError::LockAcquisitionFailed {
                pair: key.to_string(),
                reason: "lock registry poisoned".to_string(),
            })?;
        prune(&mut slots);
        Ok(Arc::clone(slots.entry(key).or_default()))
    }
}

/// Drop slots referenced only by the registry itself.
fn prune(slots: &mut HashMap<LockKey, Slot>) {
    slots.retain(|_, slot| Arc::strong_count(slot) > 1);
}

#[async_trait]
impl LockManager for KeyedLocks {
    async fn acquire(&self, key: LockKey) -> ResultEngine<LockGuard> {
        let slot = self.slot(key)?;
        let held = slot.lock_owned().await;
        tracing::debug!(key = %key, "lock acquired");
        Ok(LockGuard::new(key, held))
    }
}
