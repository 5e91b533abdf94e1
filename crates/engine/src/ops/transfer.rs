use chrono::Utc;
use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Transaction, TransferRequest, balances, transactions,
};

use super::{Engine, balances::find_balance, with_tx};

/// What a transfer did to the ledger.
enum Applied {
    Committed(Transaction),
    /// The request id was already used for this exact movement.
    Replayed(Uuid),
}

impl Engine {
    /// Move `request.amount` from the sender to the recipient.
    ///
    /// The whole operation runs under the participants' locks: funds are
    /// checked against balances nobody else can touch until the ledger row and
    /// both balance updates are committed together. On any error the ledger and
    /// both balances are left exactly as they were.
    ///
    /// Returns the id of the committed transaction, or the id recorded earlier
    /// when `request.request_id` replays a transfer that already went through.
    pub async fn transfer(&self, request: TransferRequest) -> ResultEngine<Uuid> {
        let request = request.normalized()?;
        let sender = request.sender_id.clone();
        let recipient = request.recipient_id.clone();

        let guards = match self.lock_participants(&sender, &recipient).await {
            Ok(guards) => guards,
            Err(err) => {
                tracing::error!(%sender, %recipient, "transfer not started: {err}");
                return Err(err);
            }
        };

        let outcome: ResultEngine<Applied> = async {
            with_tx!(self, EngineError::commit(&sender, &recipient), |db_tx| {
                apply_transfer(&db_tx, &request).await
            })
        }
        .await;

        self.release_participants(guards).await;

        match outcome {
            Ok(Applied::Committed(tx)) => {
                tracing::info!(
                    transaction_id = %tx.transaction_id,
                    %sender,
                    %recipient,
                    amount = %tx.amount,
                    "transfer committed"
                );
                Ok(tx.transaction_id)
            }
            Ok(Applied::Replayed(id)) => {
                tracing::info!(transaction_id = %id, %sender, %recipient, "transfer replayed");
                Ok(id)
            }
            Err(err) if err.is_retryable() => {
                tracing::error!(%sender, %recipient, "transfer failed: {err}");
                Err(err)
            }
            Err(err) => {
                tracing::warn!(%sender, %recipient, "transfer rejected: {err}");
                Err(err)
            }
        }
    }
}

/// Validate and write one transfer inside `db`, which must be an open
/// transaction whose participants are locked by the caller.
async fn apply_transfer<C: ConnectionTrait>(
    db: &C,
    request: &TransferRequest,
) -> ResultEngine<Applied> {
    if let Some(previous) = find_by_request_id(db, request).await? {
        if previous.same_transfer(request) {
            return Ok(Applied::Replayed(previous.transaction_id));
        }
        return Err(EngineError::ExistingKey(format!(
            "request_id {} of sender {}",
            previous.request_id.unwrap_or_default(),
            request.sender_id
        )));
    }

    let sender = find_balance(db, &request.sender_id).await?;
    if !request.amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be > 0, got {}",
            request.amount
        )));
    }
    let sender_after = sender.withdraw(request.amount)?;

    let recipient = find_balance(db, &request.recipient_id).await?;
    let recipient_after = recipient.deposit(request.amount)?;

    let tx = Transaction::commit(request.clone(), Utc::now());
    let on_write_err = || EngineError::commit(&request.sender_id, &request.recipient_id);

    transactions::ActiveModel::from(&tx)
        .insert(db)
        .await
        .map_err(on_write_err())?;
    balances::ActiveModel::applied(&sender.account_id, sender_after, tx.transaction_id)
        .update(db)
        .await
        .map_err(on_write_err())?;
    balances::ActiveModel::applied(&recipient.account_id, recipient_after, tx.transaction_id)
        .update(db)
        .await
        .map_err(on_write_err())?;

    Ok(Applied::Committed(tx))
}

async fn find_by_request_id<C: ConnectionTrait>(
    db: &C,
    request: &TransferRequest,
) -> ResultEngine<Option<Transaction>> {
    let Some(request_id) = request.request_id.as_deref() else {
        return Ok(None);
    };
    transactions::Entity::find()
        .filter(transactions::Column::SenderId.eq(request.sender_id.as_str()))
        .filter(transactions::Column::RequestId.eq(request_id))
        .one(db)
        .await
        .map_err(EngineError::query(format!("look up request_id {request_id}")))?
        .map(Transaction::try_from)
        .transpose()
}
