use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{ServerState, router, run_with_listener};

mod headers;
mod server;
mod transfers;

pub mod types {
    pub mod transaction {
        pub use api_types::transaction::{
            GetTransactions, PayUser, TransactionCreated, TransactionView,
        };
    }

    pub mod balance {
        pub use api_types::balance::{BalanceView, GetBalance};
    }
}

pub enum ServerError {
    Engine(EngineError),
    /// Missing or wrong credentials.
    Unauthorized,
    /// Authenticated, but acting on someone else's account.
    Forbidden(String),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ExistingKey(_) => StatusCode::CONFLICT,
        EngineError::InvalidAccount(_)
        | EngineError::InvalidAmount(_)
        | EngineError::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::LockAcquisitionFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::CommitFailed { .. }
        | EngineError::QueryFailed { .. }
        | EngineError::LockReleaseFailed { .. }
        | EngineError::InvalidId(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        err @ (EngineError::CommitFailed { .. }
        | EngineError::QueryFailed { .. }
        | EngineError::LockReleaseFailed { .. }
        | EngineError::InvalidId(_)) => {
            tracing::error!("storage error: {err}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ServerError::Forbidden(err) => (StatusCode::FORBIDDEN, err),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::DbErr;

    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::AccountNotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::ExistingKey("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        for err in [
            EngineError::InvalidAccount("x".to_string()),
            EngineError::InvalidAmount("x".to_string()),
            EngineError::InsufficientFunds("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn lock_failure_maps_to_503() {
        let res = ServerError::from(EngineError::LockAcquisitionFailed {
            pair: "[1 2]".to_string(),
            reason: "timed out".to_string(),
        })
        .into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn storage_failure_maps_to_500() {
        let res = ServerError::from(EngineError::CommitFailed {
            sender: "1".to_string(),
            recipient: "2".to_string(),
            source: DbErr::Custom("disk full".to_string()),
        })
        .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn corrupt_stored_id_maps_to_500_without_detail() {
        let res = ServerError::from(EngineError::InvalidId("invalid transaction id: x".to_string()))
            .into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(
            ServerError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::Forbidden("no".to_string()).into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
