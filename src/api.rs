//! Thin HTTP surface over [`State`]: genesis info, account queries, mempool
//! inspection, and transaction submission.

use axum::extract::{Query, State as AxumState};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ledger_core::{AccountId, SignedTx, State};
use serde::{Deserialize, Serialize};
use shared::LedgerError;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/v1/genesis", get(get_genesis))
        .route("/v1/accounts", get(get_accounts))
        .route("/v1/mempool", get(get_mempool))
        .route("/v1/tx/submit", post(submit_tx))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Wraps [`LedgerError`] so its `?`-propagated variants map to sensible
/// HTTP status codes instead of a blanket 500.
struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::InvalidAccountId(_)
            | LedgerError::InvalidTransaction(_)
            | LedgerError::InvalidBlock(_)
            | LedgerError::InvalidGenesis(_)
            | LedgerError::ReplaceUnderpriced
            | LedgerError::InsufficientFunds => StatusCode::BAD_REQUEST,
            LedgerError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            LedgerError::MiningCancelled | LedgerError::StorageError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

async fn get_genesis(AxumState(state): AxumState<Arc<State>>) -> Json<ledger_core::Genesis> {
    Json(state.genesis.clone())
}

#[derive(Deserialize)]
struct AccountsQuery {
    id: Option<String>,
}

#[derive(Serialize)]
struct AccountsResponse {
    accounts: Vec<ledger_core::Account>,
}

async fn get_accounts(
    AxumState(state): AxumState<Arc<State>>,
    Query(query): Query<AccountsQuery>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let accounts = match query.id {
        Some(id) => {
            let account_id = AccountId::new(id)?;
            vec![state.accounts.query(&account_id)?]
        }
        None => state.accounts.all(),
    };
    Ok(Json(AccountsResponse { accounts }))
}

async fn get_mempool(
    AxumState(state): AxumState<Arc<State>>,
) -> Json<Vec<ledger_core::BlockTx>> {
    Json(state.mempool.all())
}

#[derive(Deserialize)]
struct SubmitTxRequest {
    #[serde(flatten)]
    signed_tx: SignedTx,
    gas_units: u64,
}

async fn submit_tx(
    AxumState(state): AxumState<Arc<State>>,
    Json(request): Json<SubmitTxRequest>,
) -> Result<StatusCode, ApiError> {
    state.submit_tx(request.signed_tx, request.gas_units)?;
    Ok(StatusCode::OK)
}
