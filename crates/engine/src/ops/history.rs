use sea_orm::{Condition, QueryFilter, QueryOrder, prelude::*};

use crate::{EngineError, ResultEngine, Transaction, transactions, util::normalize_account_id};

use super::Engine;

impl Engine {
    /// Every committed transaction where `account_id` is sender or recipient,
    /// oldest first.
    ///
    /// Ledger rows are immutable, so this takes no lock. An account that never
    /// moved money (or does not exist) yields an empty list.
    pub async fn history(&self, account_id: &str) -> ResultEngine<Vec<Transaction>> {
        let account_id = normalize_account_id(account_id, "account_id")?;

        let models = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::SenderId.eq(account_id.as_str()))
                    .add(transactions::Column::RecipientId.eq(account_id.as_str())),
            )
            .order_by_asc(transactions::Column::CreatedAt)
            .order_by_asc(transactions::Column::Id)
            .all(&self.database)
            .await
            .map_err(EngineError::query(format!("load history of {account_id}")))?;

        models.into_iter().map(Transaction::try_from).collect()
    }
}
