//! Request and response bodies shared by the HTTP server and its clients.

use serde::{Deserialize, Serialize};

pub mod transaction {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;

    /// Body of `POST /pay_user`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct PayUser {
        /// Optional client key for safely retrying the same transfer.
        pub request_id: Option<String>,
        pub sender_id: String,
        pub recipient_id: String,
        /// Amount in minor units (cents). Must be positive.
        pub amount_minor: i64,
        pub currency: Option<String>,
        pub message: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionCreated {
        pub transaction_id: Uuid,
    }

    /// Body of `POST /get_transactions`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct GetTransactions {
        pub user_id: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct TransactionView {
        pub transaction_id: Uuid,
        pub request_id: Option<String>,
        pub sender_id: String,
        pub recipient_id: String,
        pub amount_minor: i64,
        pub currency: Option<String>,
        pub message: Option<String>,
        pub created_at: DateTime<Utc>,
    }
}

pub mod balance {
    use uuid::Uuid;

    use super::*;

    /// Body of `POST /get_balance`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct GetBalance {
        pub user_id: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    pub struct BalanceView {
        pub user_id: String,
        pub amount_minor: i64,
        pub last_transaction_id: Option<Uuid>,
    }
}
