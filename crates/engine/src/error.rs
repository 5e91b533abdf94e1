//! The module contains the error the engine can throw.
//!
//! Errors fall in two families:
//!
//! - validation rejections, produced by the engine itself and returned as-is:
//!   [`AccountNotFound`], [`InvalidAccount`], [`InvalidAmount`],
//!   [`InsufficientFunds`] and [`ExistingKey`];
//! - infrastructure failures, wrapping the storage or lock error together with
//!   the operation that hit it: [`LockAcquisitionFailed`], [`CommitFailed`] and
//!   [`QueryFailed`]. These are the only retryable ones;
//! - integrity failures: [`LockReleaseFailed`] and [`InvalidId`], a stored id
//!   that no longer parses.
//!
//!  [`AccountNotFound`]: EngineError::AccountNotFound
//!  [`InvalidAccount`]: EngineError::InvalidAccount
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`LockAcquisitionFailed`]: EngineError::LockAcquisitionFailed
//!  [`CommitFailed`]: EngineError::CommitFailed
//!  [`QueryFailed`]: EngineError::QueryFailed
//!  [`LockReleaseFailed`]: EngineError::LockReleaseFailed
//!  [`InvalidId`]: EngineError::InvalidId
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" account not found!")]
    AccountNotFound(String),
    #[error("Invalid account: {0}")]
    InvalidAccount(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("failed to acquire lock for {pair}: {reason}")]
    LockAcquisitionFailed { pair: String, reason: String },
    #[error("failed to release lock {key}: {reason}")]
    LockReleaseFailed { key: String, reason: String },
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("commit failed for transfer {sender} -> {recipient}: {source}")]
    CommitFailed {
        sender: String,
        recipient: String,
        #[source]
        source: DbErr,
    },
    #[error("{operation} failed: {source}")]
    QueryFailed {
        operation: String,
        #[source]
        source: DbErr,
    },
}

impl EngineError {
    pub(crate) fn query(operation: impl Into<String>) -> impl FnOnce(DbErr) -> Self {
        let operation = operation.into();
        move |source| Self::QueryFailed { operation, source }
    }

    pub(crate) fn commit(sender: &str, recipient: &str) -> impl FnOnce(DbErr) -> Self {
        let (sender, recipient) = (sender.to_string(), recipient.to_string());
        move |source| Self::CommitFailed {
            sender,
            recipient,
            source,
        }
    }

    /// `true` for storage and lock failures.
    ///
    /// Validation rejections are final: retrying them with the same input
    /// yields the same error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockAcquisitionFailed { .. } | Self::CommitFailed { .. } | Self::QueryFailed { .. }
        )
    }
}

impl From<DbErr> for EngineError {
    fn from(source: DbErr) -> Self {
        Self::QueryFailed {
            operation: "database".to_string(),
            source,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AccountNotFound(a), Self::AccountNotFound(b)) => a == b,
            (Self::InvalidAccount(a), Self::InvalidAccount(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (
                Self::LockReleaseFailed { key: a, reason: x },
                Self::LockReleaseFailed { key: b, reason: y },
            ) => a == b && x == y,
            (
                Self::LockAcquisitionFailed { pair: a, reason: x },
                Self::LockAcquisitionFailed { pair: b, reason: y },
            ) => a == b && x == y,
            (
                Self::CommitFailed {
                    sender: a,
                    recipient: x,
                    source: s,
                },
                Self::CommitFailed {
                    sender: b,
                    recipient: y,
                    source: t,
                },
            ) => a == b && x == y && s.to_string() == t.to_string(),
            (
                Self::QueryFailed {
                    operation: a,
                    source: s,
                },
                Self::QueryFailed {
                    operation: b,
                    source: t,
                },
            ) => a == b && s.to_string() == t.to_string(),
            _ => false,
        }
    }
}
