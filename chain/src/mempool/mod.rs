//! The transaction mempool.
//!
//! Every node keeps a durable, keyed table of all transactions it has
//! ever seen, with a per-transaction pointer to the block that confirmed
//! it (absent while unprocessed). The store is the working set for
//! gossip, bundle building and confirmation queries.

pub mod store;

pub use store::{MempoolStore, StoreError};
