// Copyright (c) 2026 Veltaros
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Thin, un-authenticated HTTP facade over the core.
//!
//! This module is deliberately small: every handler below does nothing but
//! parse a JSON body, call straight into `core::{tx,ledger,mempool,chain,
//! nonce}`, and serialize the result. Rate limiting, authentication, and the
//! production request surface belong to the out-of-scope real API layer; the
//! only gate this module applies itself is `dev_mode` for `/dev/confirm` and
//! `/dev/faucet`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::core::chain::ChainStore;
use crate::core::ledger::Ledger;
use crate::core::mempool::Mempool;
use crate::core::nonce::NonceTracker;
use crate::core::tx::{self, SignedTx};
use crate::monitoring::metrics::Metrics;

/// Shared handles the facade delegates onto. Cheap to clone (every field is
/// an `Arc`); holds no lock across an `.await` point.
#[derive(Clone)]
pub struct ApiState {
    /// Network id transactions must be bound to.
    pub network_id: String,
    /// Enables `/dev/confirm` and `/dev/faucet` when set.
    pub dev_mode: bool,
    /// Pending transactions awaiting confirmation.
    pub mempool: Arc<Mempool>,
    /// Per-sender nonce tracker.
    pub nonces: Arc<NonceTracker>,
    /// Confirmed and pending balances.
    pub ledger: Arc<Ledger>,
    /// Persisted block store, also used to run the dev "confirm" step.
    pub chain: Arc<ChainStore>,
    /// Where the ledger is persisted, needed by `ChainStore::dev_produce`.
    pub ledger_path: PathBuf,
    /// Where nonces are persisted, needed by `ChainStore::dev_produce`.
    pub nonce_path: PathBuf,
    /// Shared metrics handle, updated inline as requests are handled.
    pub metrics: Arc<Metrics>,
}

/// Build the router. The caller is responsible for binding it to
/// `config.api.listen` and applying `read_timeout`/`write_timeout`/
/// `idle_timeout`; this module has no opinion on transport concerns.
pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/tx", post(post_submit_tx))
        .route("/account/:addr", get(get_account_info))
        .route("/chain/height", get(get_chain_height))
        .route("/chain/recent", get(get_recent_blocks))
        .route("/dev/confirm", post(post_dev_confirm))
        .route("/dev/faucet", post(post_dev_faucet))
        .with_state(state)
}

/// API-level error, mapped onto a JSON problem body and a status code.
enum ApiError {
    /// The submitted transaction failed validation.
    Invalid(tx::TxValidationError),
    /// `networkId` did not match this node's configured network.
    WrongNetwork,
    /// The nonce was not strictly greater than the account's last nonce.
    NonceRejected,
    /// The sender does not have enough spendable balance to stage the spend.
    Insufficient,
    /// `/dev/*` called with `dev_mode` unset.
    DevModeDisabled,
    /// A store failed to persist during `/dev/confirm`.
    Store,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Invalid(e) => (StatusCode::BAD_REQUEST, "invalid_tx", e.to_string()),
            ApiError::WrongNetwork => {
                (StatusCode::BAD_REQUEST, "wrong_network", "transaction is bound to a different network".to_string())
            }
            ApiError::NonceRejected => {
                (StatusCode::BAD_REQUEST, "nonce_rejected", "nonce not strictly greater than last accepted".to_string())
            }
            ApiError::Insufficient => {
                (StatusCode::BAD_REQUEST, "insufficient_balance", "spendable balance too low".to_string())
            }
            ApiError::DevModeDisabled => {
                (StatusCode::FORBIDDEN, "dev_mode_disabled", "this node was not started with dev_mode".to_string())
            }
            ApiError::Store => (StatusCode::INTERNAL_SERVER_ERROR, "store_error", "persistence failed".to_string()),
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// `GET /health`: liveness probe, no business logic.
#[instrument(skip_all)]
async fn get_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Body of `POST /tx`: a fully signed transaction, as produced by
/// [`tx::sign`] on the client side.
#[derive(Deserialize)]
struct SubmitTxRequest {
    tx: SignedTx,
}

#[derive(Serialize)]
struct SubmitTxResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

/// `POST /tx`: validate, stage the spend against the ledger, reserve the
/// nonce, and admit to the mempool. Checks run signature/shape validation
/// first, then nonce, then balance.
#[instrument(skip_all, fields(tx_id = %req.tx.tx_id))]
async fn post_submit_tx(
    State(state): State<ApiState>,
    Json(req): Json<SubmitTxRequest>,
) -> Result<Json<SubmitTxResponse>, ApiError> {
    let signed = req.tx;
    let now = now_unix();

    tx::validate_with_pubkey_binding(&signed, now).map_err(ApiError::Invalid)?;
    if signed.draft.network_id != state.network_id {
        return Err(ApiError::WrongNetwork);
    }

    let d = &signed.draft;
    if !state.nonces.check_and_update(&d.from, d.nonce) {
        warn!(addr = %d.from, nonce = d.nonce, "nonce rejected");
        state.metrics.nonce_rejections_total.inc();
        return Err(ApiError::NonceRejected);
    }

    let required = d.amount.saturating_add(d.fee);
    if state.ledger.stage_mempool_spend(&d.from, required).is_err() {
        return Err(ApiError::Insufficient);
    }

    let tx_id = signed.tx_id.clone();
    state.mempool.add(signed);
    state.metrics.mempool_size.set(state.mempool.count() as i64);
    info!(%tx_id, "tx admitted to mempool");
    Ok(Json(SubmitTxResponse { tx_id }))
}

#[derive(Serialize)]
struct AccountInfoResponse {
    addr: String,
    confirmed: u64,
    pending_out: u64,
    spendable: u64,
    last_nonce: u64,
    expected_next: u64,
}

/// `GET /account/:addr`: confirmed/pending/spendable balances plus nonce
/// state, straight off `Ledger` and `NonceTracker`.
#[instrument(skip_all)]
async fn get_account_info(State(state): State<ApiState>, AxumPath(addr): AxumPath<String>) -> impl IntoResponse {
    let resp = AccountInfoResponse {
        confirmed: state.ledger.confirmed_balance(&addr),
        pending_out: state.ledger.pending_out(&addr),
        spendable: state.ledger.spendable_balance(&addr),
        last_nonce: state.nonces.get(&addr),
        expected_next: state.nonces.expected_next(&addr),
        addr,
    };
    Json(resp)
}

#[derive(Serialize)]
struct ChainHeightResponse {
    height: u64,
    #[serde(rename = "tipHash")]
    tip_hash: String,
}

/// `GET /chain/height`: current height and tip hash.
#[instrument(skip_all)]
async fn get_chain_height(State(state): State<ApiState>) -> impl IntoResponse {
    Json(ChainHeightResponse { height: state.chain.height(), tip_hash: state.chain.tip_hash() })
}

/// `GET /chain/recent`: up to [`crate::core::chain::DEFAULT_RECENT_LIMIT`]
/// most recent blocks.
#[instrument(skip_all)]
async fn get_recent_blocks(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.chain.recent(crate::core::chain::DEFAULT_RECENT_LIMIT))
}

/// `POST /dev/confirm`: drain the mempool into exactly one new block. Only
/// reachable when the node was started with `dev_mode = true`.
#[instrument(skip_all)]
async fn post_dev_confirm(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    if !state.dev_mode {
        return Err(ApiError::DevModeDisabled);
    }
    let result = state
        .chain
        .dev_produce(&state.mempool, &state.ledger, &state.ledger_path, &state.nonces, &state.nonce_path)
        .map_err(|_| ApiError::Store)?;
    state.metrics.mempool_size.set(state.mempool.count() as i64);
    info!(height = result.block.height, applied = result.applied, failed = result.failed, "dev_produce");
    Ok(Json(json!({
        "height": result.block.height,
        "applied": result.applied,
        "failed": result.failed,
    })))
}

#[derive(Deserialize)]
struct FaucetRequest {
    addr: String,
    amount: u64,
}

/// `POST /dev/faucet`: credit an address's confirmed balance directly, with
/// no corresponding transaction. Only reachable in `dev_mode`.
#[instrument(skip_all, fields(addr = %req.addr, amount = req.amount))]
async fn post_dev_faucet(
    State(state): State<ApiState>,
    Json(req): Json<FaucetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.dev_mode {
        return Err(ApiError::DevModeDisabled);
    }
    state.ledger.faucet_credit(&req.addr, req.amount);
    Ok(Json(json!({ "ok": true })))
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}
