//! Handlers serving the local chain: liveness, blocks, chain length.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::Deserialize;

use chain::{Chain, TxChain, storage};

use crate::state::SharedState;

/// `GET /running`
///
/// Liveness probe; peers check for the literal body `running`.
pub async fn running() -> &'static str {
    "running"
}

/// `GET /blockchain`
///
/// Loads the chain from disk and serves it as a JSON array of block
/// objects.
pub async fn blockchain(State(state): State<SharedState>) -> impl IntoResponse {
    let chain = TxChain::load(&state.dirs.chaindata());
    (
        [(header::CONTENT_TYPE, "application/json")],
        chain.as_json(),
    )
}

/// `GET /chainlength`
///
/// The number of blocks on disk, as plain text. Indexing starts at 0,
/// so a length of n means the next block to mine is block n.
pub async fn chainlength(State(state): State<SharedState>) -> String {
    storage::chain_len_on_disk(&state.dirs.chaindata()).to_string()
}

#[derive(Debug, Deserialize)]
pub struct BlockQuery {
    pub index: Option<u64>,
}

/// `GET /block?index=n`
///
/// Serves the n-th block file verbatim, or 400 if the parameter is
/// missing or no such block exists.
pub async fn block(
    State(state): State<SharedState>,
    Query(query): Query<BlockQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let index = query.index.ok_or(StatusCode::BAD_REQUEST)?;
    let path = state
        .dirs
        .chaindata()
        .join(storage::block_filename(index));
    let contents = std::fs::read_to_string(path).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], contents))
}
