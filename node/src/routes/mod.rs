//! HTTP request handlers for the wire API.

use axum::extract::State;

use crate::state::SharedState;

pub mod chain;
pub mod peers;
pub mod txs;

/// `GET /metrics`
///
/// Prometheus text exposition of the node metrics.
pub async fn metrics(State(state): State<SharedState>) -> String {
    state.metrics.gather_text()
}
