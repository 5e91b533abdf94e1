//! Transaction primitives.
//!
//! A `Transaction` is the immutable ledger record of one committed transfer.
//! A `TransferRequest` is what callers hand to the engine to create one.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    util::{normalize_account_id, normalize_currency, normalize_optional_text, parse_uuid},
};

/// A request to move `amount` from `sender_id` to `recipient_id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Caller-supplied key. Resubmitting the same key for the same sender
    /// replays the original transfer instead of applying it twice.
    pub request_id: Option<String>,
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: Money,
    pub currency: Option<String>,
    pub message: Option<String>,
}

impl TransferRequest {
    pub fn new(sender_id: impl Into<String>, recipient_id: impl Into<String>, amount: Money) -> Self {
        Self {
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            amount,
            ..Default::default()
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Trims every field and checks the participants.
    ///
    /// The amount is deliberately left alone: it is validated against the
    /// sender's balance once the account is known to exist.
    pub(crate) fn normalized(self) -> ResultEngine<Self> {
        let sender_id = normalize_account_id(&self.sender_id, "sender_id")?;
        let recipient_id = normalize_account_id(&self.recipient_id, "recipient_id")?;
        if sender_id == recipient_id {
            return Err(EngineError::InvalidAccount(
                "sender_id and recipient_id must differ".to_string(),
            ));
        }
        Ok(Self {
            request_id: normalize_optional_text(self.request_id.as_deref()),
            sender_id,
            recipient_id,
            amount: self.amount,
            currency: normalize_currency(self.currency.as_deref()),
            message: normalize_optional_text(self.message.as_deref()),
        })
    }
}

/// Committed ledger record. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub request_id: Option<String>,
    pub transaction_id: Uuid,
    pub sender_id: String,
    pub recipient_id: String,
    pub amount: Money,
    pub currency: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub(crate) fn commit(request: TransferRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            request_id: request.request_id,
            transaction_id: Uuid::new_v4(),
            sender_id: request.sender_id,
            recipient_id: request.recipient_id,
            amount: request.amount,
            currency: request.currency,
            message: request.message,
            created_at,
        }
    }

    /// Whether `request` asks for the same movement this record already applied.
    pub(crate) fn same_transfer(&self, request: &TransferRequest) -> bool {
        self.sender_id == request.sender_id
            && self.recipient_id == request.recipient_id
            && self.amount == request.amount
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub request_id: Option<String>,
    #[sea_orm(unique)]
    pub transaction_id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub amount_minor: i64,
    pub currency: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::NotSet,
            request_id: ActiveValue::Set(tx.request_id.clone()),
            transaction_id: ActiveValue::Set(tx.transaction_id.to_string()),
            sender_id: ActiveValue::Set(tx.sender_id.clone()),
            recipient_id: ActiveValue::Set(tx.recipient_id.clone()),
            amount_minor: ActiveValue::Set(tx.amount.minor()),
            currency: ActiveValue::Set(tx.currency.clone()),
            message: ActiveValue::Set(tx.message.clone()),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            request_id: model.request_id,
            sender_id: model.sender_id,
            recipient_id: model.recipient_id,
            amount: Money::new(model.amount_minor),
            currency: model.currency,
            message: model.message,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_trims_and_drops_blank_text() {
        let request = TransferRequest::new(" 1 ", "2", Money::new(50))
            .request_id("  ")
            .currency(" sgd ")
            .message("  Ref: abc ");
        let normalized = request.normalized().unwrap();

        assert_eq!(normalized.sender_id, "1");
        assert_eq!(normalized.request_id, None);
        assert_eq!(normalized.currency.as_deref(), Some("SGD"));
        assert_eq!(normalized.message.as_deref(), Some("Ref: abc"));
    }

    #[test]
    fn normalized_rejects_self_transfer() {
        let err = TransferRequest::new("1", " 1", Money::new(5))
            .normalized()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAccount(_)));
    }

    #[test]
    fn normalized_rejects_empty_participant() {
        let err = TransferRequest::new("", "2", Money::new(5))
            .normalized()
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAccount(_)));
    }

    #[test]
    fn normalized_keeps_non_positive_amount_for_later_validation() {
        let normalized = TransferRequest::new("1", "2", Money::new(-10))
            .normalized()
            .unwrap();
        assert_eq!(normalized.amount, Money::new(-10));
    }

    #[test]
    fn corrupt_stored_id_is_an_integrity_error() {
        let err = Transaction::try_from(Model {
            id: 7,
            request_id: None,
            transaction_id: "garbage".to_string(),
            sender_id: "1".to_string(),
            recipient_id: "2".to_string(),
            amount_minor: 5,
            currency: None,
            message: None,
            created_at: Utc::now(),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidId(_)));
    }
}
