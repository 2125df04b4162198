//! Handlers for the transaction side of the API: submission, mempool
//! queries, balances and confirmations.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use chain::{Amount, Chain, Transaction, TxChain, storage};

use crate::state::SharedState;

/// `PUT /pushtx`
///
/// Accepts a transaction as a JSON body. Invalid and duplicate
/// transactions are acknowledged with a diagnostic text and otherwise
/// ignored; submission is idempotent on the transaction uuid.
pub async fn pushtx(State(state): State<SharedState>, body: String) -> String {
    let Ok(tx) = Transaction::from_json(&body) else {
        return "Invalid transaction; ignoring".to_string();
    };
    if !tx.is_valid() {
        return "Invalid transaction; ignoring".to_string();
    }

    let store = state.mempool.lock().expect("mempool lock poisoned");
    match store.insert_if_absent(&tx) {
        Ok(true) => {
            state.metrics.node.transactions_received.inc();
            tracing::info!(uuid = %tx.uuid, "accepted transaction");
            format!("received transaction {}", tx.uuid)
        }
        Ok(false) => "duplicate transaction; ignoring".to_string(),
        Err(err) => {
            tracing::warn!(%err, "failed to store submitted transaction");
            format!("mempool error: {err}")
        }
    }
}

/// `GET /unprocessed`
///
/// All transactions not yet confirmed by any block, as a JSON list.
pub async fn unprocessed(State(state): State<SharedState>) -> Json<Vec<Transaction>> {
    let store = state.mempool.lock().expect("mempool lock poisoned");
    match store.unprocessed() {
        Ok(txs) => Json(txs),
        Err(err) => {
            tracing::warn!(%err, "failed to list unprocessed transactions");
            Json(Vec::new())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub address: Option<String>,
    pub confirmations: Option<u32>,
}

/// `GET /balance?address=<a>&confirmations=<k>`
///
/// The balance of one address as a plain-text decimal. `k` defaults
/// from the node configuration; `k=0` additionally folds in the
/// unconfirmed mempool rows touching the address.
pub async fn balance(
    State(state): State<SharedState>,
    Query(query): Query<BalanceQuery>,
) -> String {
    let Some(address) = query.address else {
        return "missing address parameter".to_string();
    };
    let confirmations = query
        .confirmations
        .unwrap_or(state.config.chain.confirmations);

    let chain = TxChain::load(&state.dirs.chaindata());
    let mut balance = chain.get_balance(&state.config.chain, &address, confirmations);

    if confirmations == 0 {
        let store = state.mempool.lock().expect("mempool lock poisoned");
        match store.balance_adjustments(&address) {
            Ok((received, transferred)) => balance = balance + received - transferred,
            Err(err) => tracing::warn!(%err, "failed to read mempool adjustments"),
        }
    }
    balance.to_string()
}

#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub prefix: Option<String>,
    pub confirmations: Option<u32>,
}

/// `GET /balances?prefix=<p>&confirmations=<k>`
///
/// Balances of every address starting with the given prefix, as a JSON
/// object. Confirmation handling matches `/balance`.
pub async fn balances(
    State(state): State<SharedState>,
    Query(query): Query<BalancesQuery>,
) -> Json<BTreeMap<String, Amount>> {
    let prefix = query.prefix.unwrap_or_default();
    let confirmations = query
        .confirmations
        .unwrap_or(state.config.chain.confirmations);

    let chain = TxChain::load(&state.dirs.chaindata());
    let mut selected: BTreeMap<String, Amount> = chain
        .get_balances(&state.config.chain, confirmations)
        .into_iter()
        .filter(|(address, _)| address.starts_with(&prefix))
        .collect();

    if confirmations == 0 {
        let store = state.mempool.lock().expect("mempool lock poisoned");
        for (address, balance) in selected.iter_mut() {
            match store.balance_adjustments(address) {
                Ok((received, transferred)) => *balance = *balance + received - transferred,
                Err(err) => tracing::warn!(%err, "failed to read mempool adjustments"),
            }
        }
    }
    Json(selected)
}

#[derive(Debug, Deserialize)]
pub struct ConfirmationsQuery {
    pub transaction_id: Option<String>,
}

/// `GET /confirmations?transaction_id=<uuid>`
///
/// How many blocks confirm the transaction: `chain length - block
/// index`, or 0 for an unconfirmed or unknown transaction. Missing id
/// is a 400.
pub async fn confirmations(
    State(state): State<SharedState>,
    Query(query): Query<ConfirmationsQuery>,
) -> Result<String, StatusCode> {
    let uuid = query
        .transaction_id
        .filter(|id| !id.is_empty())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let store = state.mempool.lock().expect("mempool lock poisoned");
    match store.block_index(&uuid) {
        Ok(block_index) => {
            let chain_len = storage::chain_len_on_disk(&state.dirs.chaindata());
            Ok(chain::confirmations(chain_len, block_index).to_string())
        }
        Err(err) => {
            tracing::warn!(%err, "failed to look up confirmation state");
            Ok("0".to_string())
        }
    }
}
