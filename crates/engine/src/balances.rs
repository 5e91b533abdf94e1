//! The module contains the `Balance` struct and its storage model.

use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Money, ResultEngine, util::parse_uuid};

/// Current amount held by one account.
///
/// A balance only changes through a committed transfer, and every change
/// records the transfer that caused it in `last_transaction_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: String,
    pub amount: Money,
    /// `None` until the account takes part in its first transfer.
    pub last_transaction_id: Option<Uuid>,
}

impl Balance {
    /// Balance left after withdrawing `amount`, refusing to go below zero.
    pub(crate) fn withdraw(&self, amount: Money) -> ResultEngine<Money> {
        match self.amount.checked_sub(amount) {
            Some(left) if !left.is_negative() => Ok(left),
            _ => Err(EngineError::InsufficientFunds(format!(
                "account {} holds {}, cannot send {}",
                self.account_id, self.amount, amount
            ))),
        }
    }

    pub(crate) fn deposit(&self, amount: Money) -> ResultEngine<Money> {
        self.amount.checked_add(amount).ok_or_else(|| {
            EngineError::InvalidAmount(format!(
                "crediting {} to account {} overflows its balance",
                amount, self.account_id
            ))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub amount_minor: i64,
    pub last_transaction_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// Full-row update moving the account to `amount` as a result of `transaction_id`.
    pub(crate) fn applied(account_id: &str, amount: Money, transaction_id: Uuid) -> Self {
        Self {
            account_id: ActiveValue::Set(account_id.to_string()),
            amount_minor: ActiveValue::Set(amount.minor()),
            last_transaction_id: ActiveValue::Set(Some(transaction_id.to_string())),
        }
    }
}

impl TryFrom<Model> for Balance {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let last_transaction_id = model
            .last_transaction_id
            .as_deref()
            .map(|id| parse_uuid(id, "last transaction"))
            .transpose()?;

        Ok(Self {
            account_id: model.account_id,
            amount: Money::new(model.amount_minor),
            last_transaction_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balance(amount_minor: i64) -> Balance {
        Balance {
            account_id: "1".to_string(),
            amount: Money::new(amount_minor),
            last_transaction_id: None,
        }
    }

    #[test]
    fn withdraw_allows_draining_to_zero() {
        assert_eq!(balance(50).withdraw(Money::new(50)), Ok(Money::ZERO));
        assert_eq!(balance(51).withdraw(Money::new(50)), Ok(Money::new(1)));
    }

    #[test]
    fn withdraw_refuses_overdraft() {
        let err = balance(49).withdraw(Money::new(50)).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds(_)));
    }

    #[test]
    fn deposit_detects_overflow() {
        let err = balance(i64::MAX).deposit(Money::new(1)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn model_round_trips_last_transaction() {
        let id = Uuid::new_v4();
        let parsed = Balance::try_from(Model {
            account_id: "2".to_string(),
            amount_minor: 100,
            last_transaction_id: Some(id.to_string()),
        })
        .unwrap();
        assert_eq!(parsed.last_transaction_id, Some(id));
        assert_eq!(parsed.amount, Money::new(100));
    }

    #[test]
    fn corrupt_last_transaction_is_an_integrity_error() {
        let err = Balance::try_from(Model {
            account_id: "2".to_string(),
            amount_minor: 100,
            last_transaction_id: Some("not-a-uuid".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidId(_)));
        assert!(!err.is_retryable());
    }
}
