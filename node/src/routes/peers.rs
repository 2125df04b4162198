//! Handlers for peer discovery: listing and registration.

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::state::SharedState;

/// `GET /nodes`
///
/// The current list of known peer URLs, minus any whose lease expired.
pub async fn nodes(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.peers.keys())
}

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    pub url: Option<String>,
}

/// `GET /register?url=<url>`
///
/// Upserts the caller into the peer set; last registration wins on the
/// timestamp.
pub async fn register(
    State(state): State<SharedState>,
    Query(query): Query<RegisterQuery>,
) -> String {
    match query.url {
        Some(url) => {
            state.peers.upsert(&url);
            format!("registered {url}")
        }
        None => "missing url parameter".to_string(),
    }
}
