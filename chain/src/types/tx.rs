//! Signed value-transfer transactions and block payloads.
//!
//! A [`Transaction`] moves an amount from one address to another, pays a
//! fee to whoever mines it, and is immutable once signed: the signature
//! covers the canonical header string, so any later field change breaks
//! validity. A [`TransactionBundle`] is the ordered list of transactions
//! a block carries, together with the miner address the reward and fees
//! are credited to; its JSON form is stored verbatim in the block's
//! `data` field.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{Keypair, verify_signature};

use super::Amount;

/// One signed value transfer.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Transaction {
    /// 32-char hex identifier, generated fresh at creation. Primary key
    /// everywhere the transaction is stored or gossiped.
    pub uuid: String,

    /// Sender address (hex public key). The signature must verify
    /// against this key.
    pub from_addr: String,

    /// Recipient address (hex public key).
    pub to_addr: String,

    /// Transferred amount. Non-negative.
    pub amount: Amount,

    /// Fee credited to the miner of the containing block. Non-negative.
    pub fee: Amount,

    /// Arbitrary free-text message.
    pub msg: String,

    /// Hex ECDSA signature over [`Transaction::header`]; absent until
    /// signed.
    #[serde(default)]
    pub signature: Option<String>,
}

impl Transaction {
    /// Creates an unsigned transaction with a fresh uuid.
    pub fn new(
        from_addr: impl Into<String>,
        to_addr: impl Into<String>,
        amount: Amount,
        fee: Amount,
        msg: impl Into<String>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4().simple().to_string(),
            from_addr: from_addr.into(),
            to_addr: to_addr.into(),
            amount,
            fee,
            msg: msg.into(),
            signature: None,
        }
    }

    /// The canonical header string covered by the signature:
    /// `{uuid}:{from}:{to}:{amount}:{fee}:{msg}` with amounts in their
    /// canonical decimal rendering.
    pub fn header(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}:{}",
            self.uuid, self.from_addr, self.to_addr, self.amount, self.fee, self.msg
        )
    }

    /// Signs the header with the given keypair, setting `signature`.
    pub fn sign(&mut self, keypair: &Keypair) {
        self.signature = Some(keypair.sign(&self.header()));
    }

    /// A transaction is well-formed iff its amounts are non-negative and
    /// its signature is present and verifies against `from_addr`.
    pub fn is_valid(&self) -> bool {
        if self.amount.is_negative() || self.fee.is_negative() {
            return false;
        }
        match &self.signature {
            Some(signature) => verify_signature(&self.from_addr, &self.header(), signature),
            None => false,
        }
    }

    /// Parses a transaction from its JSON object form.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serializes this transaction as a JSON object.
    pub fn as_json(&self) -> String {
        serde_json::to_string(self).expect("transactions are always serializable to JSON")
    }
}

/// The payload of a currency block: an ordered package of transactions
/// plus the address collecting the block reward and all fees.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TransactionBundle {
    /// Free-text label, conventionally `"Mined by {node}"`.
    pub msg: String,

    /// Address the block reward and every included fee are credited to.
    pub miner_address: String,

    /// Transactions in inclusion order. Order is preserved bit-exactly
    /// across serialize/deserialize.
    pub transactions: Vec<Transaction>,
}

impl TransactionBundle {
    pub fn new(
        msg: impl Into<String>,
        miner_address: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            msg: msg.into(),
            miner_address: miner_address.into(),
            transactions,
        }
    }

    /// Serializes the bundle into the string stored in a block's `data`
    /// field.
    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).expect("bundles are always serializable to JSON")
    }

    /// Parses a bundle back out of a block payload.
    pub fn from_payload(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// A bundle is well-formed iff every transaction in it is.
    pub fn is_valid(&self) -> bool {
        self.transactions.iter().all(Transaction::is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(keypair: &Keypair, to: &str, amount: f64, fee: f64) -> Transaction {
        let mut tx = Transaction::new(
            keypair.address(),
            to,
            Amount::from_f64(amount),
            Amount::from_f64(fee),
            "test transfer",
        );
        tx.sign(keypair);
        tx
    }

    #[test]
    fn fresh_transactions_get_distinct_uuids() {
        let a = Transaction::new("aa", "bb", Amount::ZERO, Amount::ZERO, "");
        let b = Transaction::new("aa", "bb", Amount::ZERO, Amount::ZERO, "");
        assert_ne!(a.uuid, b.uuid);
        assert_eq!(a.uuid.len(), 32);
        assert!(a.uuid.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn header_uses_canonical_decimal_rendering() {
        let mut tx = Transaction::new("aa", "bb", Amount::from_f64(0.9), Amount::from_f64(0.01), "hi");
        tx.uuid = "0123".to_string();
        assert_eq!(tx.header(), "0123:aa:bb:0.9:0.01:hi");
    }

    #[test]
    fn signed_transaction_verifies_and_tampering_breaks_it() {
        let alice = Keypair::from_seed("0");
        let bob = Keypair::from_seed("1");
        let tx = transfer(&alice, bob.address(), 0.9, 0.01);
        assert!(tx.is_valid());

        let mut tampered = tx.clone();
        tampered.amount = Amount::from_f64(9.0);
        assert!(!tampered.is_valid());

        let mut rerouted = tx.clone();
        rerouted.to_addr = alice.address().to_string();
        assert!(!rerouted.is_valid());

        let mut unsigned = tx.clone();
        unsigned.signature = None;
        assert!(!unsigned.is_valid());
    }

    #[test]
    fn negative_amounts_are_rejected_even_when_signed() {
        let alice = Keypair::from_seed("0");
        let mut tx = Transaction::new(
            alice.address(),
            "bb",
            Amount::from_f64(-1.0),
            Amount::ZERO,
            "",
        );
        tx.sign(&alice);
        assert!(!tx.is_valid());
    }

    #[test]
    fn transaction_json_roundtrip_is_identity() {
        let alice = Keypair::from_seed("0");
        let tx = transfer(&alice, "bb", 1.5, 0.25);
        let back = Transaction::from_json(&tx.as_json()).expect("transaction decodes");
        assert_eq!(back, tx);
        assert!(back.is_valid());
    }

    #[test]
    fn bundle_payload_preserves_transaction_order() {
        let alice = Keypair::from_seed("0");
        let txs: Vec<Transaction> = (0..4)
            .map(|i| transfer(&alice, "bb", f64::from(i), 0.01))
            .collect();
        let uuids: Vec<String> = txs.iter().map(|tx| tx.uuid.clone()).collect();

        let bundle = TransactionBundle::new("label", "miner", txs);
        let back =
            TransactionBundle::from_payload(&bundle.to_payload()).expect("bundle decodes");
        assert_eq!(back, bundle);
        let back_uuids: Vec<String> = back.transactions.iter().map(|tx| tx.uuid.clone()).collect();
        assert_eq!(back_uuids, uuids);
    }

    #[test]
    fn bundle_validity_requires_every_transaction_valid() {
        let alice = Keypair::from_seed("0");
        let good = transfer(&alice, "bb", 1.0, 0.0);
        let mut bad = transfer(&alice, "bb", 1.0, 0.0);
        bad.msg.push('!');

        assert!(TransactionBundle::new("", "miner", vec![good.clone()]).is_valid());
        assert!(!TransactionBundle::new("", "miner", vec![good, bad]).is_valid());
    }
}
