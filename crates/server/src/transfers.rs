//! Transfer and history API endpoints

use api_types::{
    balance::{BalanceView, GetBalance},
    transaction::{GetTransactions, PayUser, TransactionCreated, TransactionView},
};
use axum::{Extension, Json, extract::State};
use engine::{Money, Transaction, TransferRequest};

use crate::{
    ServerError,
    server::{AuthenticatedUser, ServerState},
};

/// Callers may only act on their own account.
fn ensure_owner(user: &AuthenticatedUser, account_id: &str) -> Result<(), ServerError> {
    if user.0 == account_id.trim() {
        return Ok(());
    }
    tracing::warn!(user = %user.0, account = %account_id, "access to another account");
    Err(ServerError::Forbidden(format!(
        "user {} cannot act on account {account_id}",
        user.0
    )))
}

fn transaction_view(tx: Transaction) -> TransactionView {
    TransactionView {
        transaction_id: tx.transaction_id,
        request_id: tx.request_id,
        sender_id: tx.sender_id,
        recipient_id: tx.recipient_id,
        amount_minor: tx.amount.minor(),
        currency: tx.currency,
        message: tx.message,
        created_at: tx.created_at,
    }
}

pub async fn pay_user(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<ServerState>,
    Json(payload): Json<PayUser>,
) -> Result<Json<TransactionCreated>, ServerError> {
    ensure_owner(&user, &payload.sender_id)?;

    let request = TransferRequest {
        request_id: payload.request_id,
        currency: payload.currency,
        message: payload.message,
        ..TransferRequest::new(
            payload.sender_id,
            payload.recipient_id,
            Money::new(payload.amount_minor),
        )
    };
    let transaction_id = state.engine.transfer(request).await?;

    Ok(Json(TransactionCreated { transaction_id }))
}

pub async fn get_transactions(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<ServerState>,
    Json(payload): Json<GetTransactions>,
) -> Result<Json<Vec<TransactionView>>, ServerError> {
    ensure_owner(&user, &payload.user_id)?;

    let transactions = state
        .engine
        .history(&payload.user_id)
        .await?
        .into_iter()
        .map(transaction_view)
        .collect();

    Ok(Json(transactions))
}

pub async fn get_balance(
    Extension(user): Extension<AuthenticatedUser>,
    State(state): State<ServerState>,
    Json(payload): Json<GetBalance>,
) -> Result<Json<BalanceView>, ServerError> {
    ensure_owner(&user, &payload.user_id)?;

    let balance = state.engine.balance(&payload.user_id).await?;

    Ok(Json(BalanceView {
        user_id: balance.account_id,
        amount_minor: balance.amount.minor(),
        last_transaction_id: balance.last_transaction_id,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Router,
        body::Body,
        http::{HeaderMap, HeaderValue, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use migration::MigratorTrait;
    use sea_orm::{ConnectOptions, Database};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use engine::{Engine, Money};

    use crate::{ServerState, router};

    async fn app() -> Router {
        let mut options = ConnectOptions::new("sqlite::memory:");
        options.max_connections(1).sqlx_logging(false);
        let db = Database::connect(options).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();

        let engine = Engine::builder().database(db).build().await.unwrap();
        engine.open_account("1", Money::new(51)).await.unwrap();
        engine.open_account("2", Money::ZERO).await.unwrap();

        let tokens = HashMap::from([
            ("1".to_string(), "token-1".to_string()),
            ("2".to_string(), "token-2".to_string()),
            ("3".to_string(), "token-3".to_string()),
        ]);
        router(ServerState::new(engine, tokens))
    }

    async fn call(
        app: &Router,
        path: &str,
        credentials: Option<(&str, &str)>,
        headers: &[(&str, &[u8])],
        body: Value,
    ) -> (StatusCode, HeaderMap, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some((user, token)) = credentials {
            request = request.header("x-user-id", user).header("authorization", token);
        }
        for (name, value) in headers {
            request = request.header(*name, HeaderValue::from_bytes(value).unwrap());
        }

        let response = app
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, headers, body)
    }

    async fn balance_of(app: &Router, user: &str, token: &str) -> i64 {
        let (status, _, body) = call(
            app,
            "/get_balance",
            Some((user, token)),
            &[],
            json!({ "user_id": user }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["amount_minor"].as_i64().unwrap()
    }

    fn payment(amount_minor: i64) -> Value {
        json!({
            "sender_id": "1",
            "recipient_id": "2",
            "amount_minor": amount_minor,
            "currency": "SGD",
            "message": "Ref: abc",
        })
    }

    #[tokio::test]
    async fn pay_user_moves_funds() {
        let app = app().await;

        let (status, _, body) = call(&app, "/pay_user", Some(("1", "token-1")), &[], payment(50)).await;
        assert_eq!(status, StatusCode::OK);
        let id: Uuid = body["transaction_id"].as_str().unwrap().parse().unwrap();

        assert_eq!(balance_of(&app, "1", "token-1").await, 1);
        assert_eq!(balance_of(&app, "2", "token-2").await, 50);

        let (status, _, body) = call(
            &app,
            "/get_transactions",
            Some(("2", "token-2")),
            &[],
            json!({ "user_id": "2" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["transaction_id"], json!(id.to_string()));
        assert_eq!(rows[0]["amount_minor"], json!(50));
        assert_eq!(rows[0]["message"], json!("Ref: abc"));
    }

    #[tokio::test]
    async fn rejected_transfers_map_to_client_errors() {
        let app = app().await;

        let (status, _, body) = call(&app, "/pay_user", Some(("1", "token-1")), &[], payment(52)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("Insufficient funds"));

        let (status, _, _) = call(&app, "/pay_user", Some(("1", "token-1")), &[], payment(-10)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _, _) = call(
            &app,
            "/pay_user",
            Some(("1", "token-1")),
            &[],
            json!({ "sender_id": "1", "recipient_id": "9", "amount_minor": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert_eq!(balance_of(&app, "1", "token-1").await, 51);
    }

    #[tokio::test]
    async fn request_id_replays_and_conflicts() {
        let app = app().await;
        let mut body = payment(10);
        body["request_id"] = json!("r-1");

        let (_, _, first) = call(&app, "/pay_user", Some(("1", "token-1")), &[], body.clone()).await;
        let (status, _, second) = call(&app, "/pay_user", Some(("1", "token-1")), &[], body.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first, second);
        assert_eq!(balance_of(&app, "1", "token-1").await, 41);

        body["amount_minor"] = json!(11);
        let (status, _, _) = call(&app, "/pay_user", Some(("1", "token-1")), &[], body).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn credentials_are_required() {
        let app = app().await;

        let (status, _, _) = call(&app, "/pay_user", None, &[], payment(1)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = call(&app, "/pay_user", Some(("1", "token-2")), &[], payment(1)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = call(&app, "/pay_user", Some(("7", "token-7")), &[], payment(1)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(balance_of(&app, "1", "token-1").await, 51);
    }

    #[tokio::test]
    async fn users_cannot_act_on_other_accounts() {
        let app = app().await;

        let (status, _, _) = call(&app, "/pay_user", Some(("2", "token-2")), &[], payment(1)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = call(
            &app,
            "/get_transactions",
            Some(("2", "token-2")),
            &[],
            json!({ "user_id": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, _) = call(
            &app,
            "/get_balance",
            Some(("2", "token-2")),
            &[],
            json!({ "user_id": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn empty_history_and_missing_balance() {
        let app = app().await;

        let (status, _, body) = call(
            &app,
            "/get_transactions",
            Some(("3", "token-3")),
            &[],
            json!({ "user_id": "3" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        let (status, _, _) = call(
            &app,
            "/get_balance",
            Some(("3", "token-3")),
            &[],
            json!({ "user_id": "3" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn trace_id_is_echoed_or_generated() {
        let app = app().await;

        let (_, headers, _) = call(
            &app,
            "/get_balance",
            Some(("1", "token-1")),
            &[("x-trace-id", b"trace-42".as_slice())],
            json!({ "user_id": "1" }),
        )
        .await;
        assert_eq!(headers.get("x-trace-id").unwrap(), "trace-42");

        // Rejected requests carry one too.
        let (status, headers, _) = call(&app, "/get_balance", None, &[], json!({ "user_id": "1" })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let generated = headers.get("x-trace-id").unwrap().to_str().unwrap();
        assert!(generated.parse::<Uuid>().is_ok());
    }

    #[tokio::test]
    async fn unreadable_trace_id_is_replaced() {
        let app = app().await;

        let (status, headers, body) = call(
            &app,
            "/get_balance",
            Some(("1", "token-1")),
            &[("x-trace-id", b"abc\xff".as_slice())],
            json!({ "user_id": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount_minor"], json!(51));
        let echoed = headers.get("x-trace-id").unwrap().to_str().unwrap();
        assert!(echoed.parse::<Uuid>().is_ok());
    }

    #[tokio::test]
    async fn unreadable_credentials_are_unauthorized() {
        let app = app().await;

        let (status, _, _) = call(
            &app,
            "/get_balance",
            None,
            &[
                ("x-user-id", b"1".as_slice()),
                ("authorization", b"token-\xff".as_slice()),
            ],
            json!({ "user_id": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, headers, _) = call(
            &app,
            "/get_balance",
            None,
            &[
                ("x-user-id", b"\xff1".as_slice()),
                ("authorization", b"token-1".as_slice()),
            ],
            json!({ "user_id": "1" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(headers.contains_key("x-trace-id"));
    }
}
