//! SQLite-backed mempool store.
//!
//! One row per known transaction, keyed by uuid, with a nullable `block`
//! column holding the index of the confirming block. Amounts and fees
//! are stored as integer micro-coins so SQL aggregation stays exact.
//! Every mutation commits immediately (the connection runs in
//! autocommit mode).

use std::fmt;
use std::path::Path;

use rusqlite::{Connection, Row, params};

use crate::types::{Amount, Transaction};

const SCHEMA: &str = "
create table if not exists transactions
(uuid      varchar primary key not null,
 from_addr varchar             not null,
 to_addr   varchar             not null,
 amount    integer             not null,
 fee       integer             not null,
 msg       varchar             not null,
 signature varchar             not null,
 block     int);
";

/// Mempool-level error type.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite error.
    Sqlite(rusqlite::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(err) => write!(f, "mempool database error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err)
    }
}

/// Durable keyed store of known transactions.
pub struct MempoolStore {
    conn: Connection,
}

impl MempoolStore {
    /// Opens (or creates) the store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory store. Used by tests and simulations.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Inserts a transaction unless its uuid is already present.
    /// Returns `true` if a row was actually inserted.
    pub fn insert_if_absent(&self, tx: &Transaction) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "insert or ignore into transactions values (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
            params![
                tx.uuid,
                tx.from_addr,
                tx.to_addr,
                tx.amount.micros(),
                tx.fee.micros(),
                tx.msg,
                tx.signature.as_deref().unwrap_or(""),
            ],
        )?;
        Ok(inserted > 0)
    }

    /// Whether a transaction with this uuid is known.
    pub fn exists(&self, uuid: &str) -> Result<bool, StoreError> {
        let count: i64 = self.conn.query_row(
            "select count(*) from transactions where uuid = ?1",
            [uuid],
            |row| row.get(0),
        )?;
        Ok(count != 0)
    }

    /// All transactions not yet confirmed by any block.
    pub fn unprocessed(&self) -> Result<Vec<Transaction>, StoreError> {
        self.select_transactions("select uuid, from_addr, to_addr, amount, fee, msg, signature from transactions where block is null")
    }

    /// Unconfirmed transactions ordered by fee, highest first. This is
    /// the order the bundle builder considers them in.
    pub fn unprocessed_by_fee(&self) -> Result<Vec<Transaction>, StoreError> {
        self.select_transactions("select uuid, from_addr, to_addr, amount, fee, msg, signature from transactions where block is null order by fee desc")
    }

    fn select_transactions(&self, sql: &str) -> Result<Vec<Transaction>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_transaction)?;
        let mut txs = Vec::new();
        for row in rows {
            txs.push(row?);
        }
        Ok(txs)
    }

    /// Records that a transaction is confirmed by the block at
    /// `block_index`.
    pub fn mark(&self, uuid: &str, block_index: u64) -> Result<(), StoreError> {
        self.conn.execute(
            "update transactions set block = ?1 where uuid = ?2",
            params![block_index as i64, uuid],
        )?;
        Ok(())
    }

    /// Resets every transaction to unprocessed. Called on node startup
    /// and at the start of each reconciliation pass.
    pub fn unmark_all(&self) -> Result<(), StoreError> {
        self.conn
            .execute("update transactions set block = null", [])?;
        Ok(())
    }

    /// The index of the block confirming this transaction, if any.
    pub fn block_index(&self, uuid: &str) -> Result<Option<u64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("select block from transactions where uuid = ?1")?;
        let mut rows = stmt.query([uuid])?;
        match rows.next()? {
            None => Ok(None),
            Some(row) => {
                let block: Option<i64> = row.get(0)?;
                Ok(block.map(|index| index as u64))
            }
        }
    }

    /// Sums the unconfirmed activity of an address: what it stands to
    /// receive, and what it has pledged to transfer including fees.
    pub fn balance_adjustments(&self, address: &str) -> Result<(Amount, Amount), StoreError> {
        let received: i64 = self.conn.query_row(
            "select coalesce(sum(amount), 0) from transactions where to_addr = ?1 and block is null",
            [address],
            |row| row.get(0),
        )?;
        let transferred: i64 = self.conn.query_row(
            "select coalesce(sum(amount) + sum(fee), 0) from transactions where from_addr = ?1 and block is null",
            [address],
            |row| row.get(0),
        )?;
        Ok((
            Amount::from_micros(received),
            Amount::from_micros(transferred),
        ))
    }
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let signature: String = row.get(6)?;
    Ok(Transaction {
        uuid: row.get(0)?,
        from_addr: row.get(1)?,
        to_addr: row.get(2)?,
        amount: Amount::from_micros(row.get(3)?),
        fee: Amount::from_micros(row.get(4)?),
        msg: row.get(5)?,
        signature: if signature.is_empty() {
            None
        } else {
            Some(signature)
        },
    })
}
