use sea_orm::{ActiveValue, ConnectionTrait, prelude::*};

use crate::{Balance, EngineError, LockKey, Money, ResultEngine, balances, util::normalize_account_id};

use super::{Engine, with_tx};

/// Point lookup of one balance row on any connection or open transaction.
pub(super) async fn find_balance<C: ConnectionTrait>(
    db: &C,
    account_id: &str,
) -> ResultEngine<Balance> {
    let model = balances::Entity::find_by_id(account_id.to_string())
        .one(db)
        .await
        .map_err(EngineError::query(format!("load balance of {account_id}")))?
        .ok_or_else(|| EngineError::AccountNotFound(account_id.to_string()))?;
    Balance::try_from(model)
}

impl Engine {
    /// Current balance of `account_id`.
    ///
    /// Accounts without a balance row are reported as
    /// [`EngineError::AccountNotFound`], never as an implicit zero.
    pub async fn balance(&self, account_id: &str) -> ResultEngine<Balance> {
        let account_id = normalize_account_id(account_id, "account_id")?;
        find_balance(&self.database, &account_id).await
    }

    /// Sum of every balance in the ledger.
    ///
    /// Transfers move value without creating it, so this only changes when an
    /// account is opened.
    pub async fn total_balance(&self) -> ResultEngine<Money> {
        let models = balances::Entity::find()
            .all(&self.database)
            .await
            .map_err(EngineError::query("sum balances"))?;
        models
            .into_iter()
            .try_fold(Money::ZERO, |total, model| {
                total.checked_add(Money::new(model.amount_minor))
            })
            .ok_or_else(|| EngineError::InvalidAmount("total balance overflows".to_string()))
    }

    /// Create the balance row for a new account, funded with `opening`.
    pub async fn open_account(&self, account_id: &str, opening: Money) -> ResultEngine<Balance> {
        let account_id = normalize_account_id(account_id, "account_id")?;
        if opening.is_negative() {
            return Err(EngineError::InvalidAmount(
                "opening balance must be >= 0".to_string(),
            ));
        }

        // Concurrent opens of one id must end in ExistingKey, not a constraint violation.
        let guard = self.locks.acquire(LockKey::for_account(&account_id)).await?;

        let inserted: ResultEngine<Balance> = async {
            with_tx!(
                self,
                EngineError::query(format!("open account {account_id}")),
                |db_tx| insert_balance(&db_tx, &account_id, opening).await
            )
        }
        .await;
        self.release_participants(vec![guard]).await;
        let balance = inserted?;

        tracing::info!(account = %balance.account_id, amount = %balance.amount, "account opened");
        Ok(balance)
    }
}

async fn insert_balance<C: ConnectionTrait>(
    db: &C,
    account_id: &str,
    opening: Money,
) -> ResultEngine<Balance> {
    let exists = balances::Entity::find_by_id(account_id.to_string())
        .one(db)
        .await
        .map_err(EngineError::query(format!("load balance of {account_id}")))?;
    if exists.is_some() {
        return Err(EngineError::ExistingKey(account_id.to_string()));
    }

    let model = balances::ActiveModel {
        account_id: ActiveValue::Set(account_id.to_string()),
        amount_minor: ActiveValue::Set(opening.minor()),
        last_transaction_id: ActiveValue::Set(None),
    }
    .insert(db)
    .await
    .map_err(EngineError::query(format!("insert balance of {account_id}")))?;

    Balance::try_from(model)
}
