use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::post,
};
use axum_extra::headers::HeaderMapExt;
use tracing::Instrument;

use std::{collections::HashMap, sync::Arc};

use crate::{
    ServerError,
    headers::{Token, TraceId, UserId},
    transfers,
};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Token issued to each user id.
    pub tokens: Arc<HashMap<String, String>>,
}

impl ServerState {
    pub fn new(engine: Engine, tokens: HashMap<String, String>) -> Self {
        Self {
            engine: Arc::new(engine),
            tokens: Arc::new(tokens),
        }
    }
}

/// The user id proven by the request headers.
#[derive(Clone, Debug)]
pub(crate) struct AuthenticatedUser(pub String);

async fn auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    // Unreadable credentials are treated like missing ones.
    let headers = request.headers();
    let credentials = (
        headers.typed_try_get::<UserId>().ok().flatten(),
        headers.typed_try_get::<Token>().ok().flatten(),
    );
    let (Some(UserId(user_id)), Some(Token(token))) = credentials else {
        tracing::warn!("missing credentials");
        return Err(ServerError::Unauthorized);
    };

    match state.tokens.get(&user_id) {
        Some(expected) if !token.is_empty() && *expected == token => {}
        _ => {
            tracing::warn!(user = %user_id, "rejected credentials");
            return Err(ServerError::Unauthorized);
        }
    }

    request.extensions_mut().insert(AuthenticatedUser(user_id));
    Ok(next.run(request).await)
}

/// Run every request inside a span carrying its trace id, and echo the id back.
///
/// A missing, empty or unreadable `X-Trace-Id` gets a fresh one.
async fn trace(request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .typed_try_get::<TraceId>()
        .ok()
        .flatten()
        .filter(|id| !id.0.is_empty())
        .unwrap_or_else(TraceId::generate);

    let span = tracing::info_span!(
        "request",
        trace_id = %trace_id.0,
        method = %request.method(),
        path = %request.uri().path(),
    );
    let mut response = next.run(request).instrument(span.clone()).await;
    span.in_scope(|| tracing::debug!(status = %response.status(), "request completed"));

    response.headers_mut().typed_insert(trace_id);
    response
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/pay_user", post(transfers::pay_user))
        .route("/get_transactions", post(transfers::get_transactions))
        .route("/get_balance", post(transfers::get_balance))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth))
        .layer(middleware::from_fn(trace))
        .with_state(state)
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router(state)).await
}
