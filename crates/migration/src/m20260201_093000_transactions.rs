//! Append-only ledger of committed transfers.
//!
//! Rows are never updated or deleted by the engine. The integer `id` only
//! exists to give history queries a stable insertion-order tie breaker.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    RequestId,
    TransactionId,
    SenderId,
    RecipientId,
    AmountMinor,
    Currency,
    Message,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::RequestId).string())
                    .col(
                        ColumnDef::new(Transactions::TransactionId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::SenderId).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::RecipientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Currency).string())
                    .col(ColumnDef::new(Transactions::Message).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uidx-transactions-transaction_id")
                    .table(Transactions::Table)
                    .col(Transactions::TransactionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // NULL request ids never collide, so anonymous transfers stay unconstrained.
        manager
            .create_index(
                Index::create()
                    .name("uidx-transactions-sender_id-request_id")
                    .table(Transactions::Table)
                    .col(Transactions::SenderId)
                    .col(Transactions::RequestId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-recipient_id")
                    .table(Transactions::Table)
                    .col(Transactions::RecipientId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx-transactions-recipient_id")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("uidx-transactions-sender_id-request_id")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("uidx-transactions-transaction_id")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}
