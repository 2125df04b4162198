//! ECDSA keys, addresses and signatures.
//!
//! Addresses are the hex encoding of the raw `x || y` public key point
//! on NIST P-256; signatures are the hex of the fixed-size `r || s`
//! encoding, produced deterministically (RFC 6979) over the SHA-256
//! digest of the message. Everything here is stringly-typed on purpose:
//! addresses and signatures travel over JSON and into SQL as hex text.

use p256::EncodedPoint;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::generic_array::GenericArray;
use sha2::{Digest, Sha256};

use crate::types::ADDRESS_HEX_LEN;

/// Byte length of an untagged `x || y` public key point on P-256.
const POINT_LEN: usize = 64;

/// Verifies a hex signature over `msg` against a hex address.
///
/// Returns `false` on any malformed input (bad hex, wrong lengths, a
/// point not on the curve) as well as on a genuine signature mismatch.
/// Never panics; callers treat the result as the final verdict.
pub fn verify_signature(address: &str, msg: &str, signature: &str) -> bool {
    let Ok(point_bytes) = hex::decode(address) else {
        return false;
    };
    if point_bytes.len() != POINT_LEN {
        return false;
    }
    let point = EncodedPoint::from_untagged_bytes(GenericArray::from_slice(&point_bytes));
    let Ok(verifying) = VerifyingKey::from_encoded_point(&point) else {
        return false;
    };

    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&sig_bytes) else {
        return false;
    };

    verifying.verify(msg.as_bytes(), &signature).is_ok()
}

/// Cheap shape check: could this string be an address at all?
///
/// Used to decide whether a CLI argument is an address or a seed to
/// derive one from. It does not prove the point is on the curve.
pub fn could_be_valid_address(candidate: &str) -> bool {
    candidate.len() == ADDRESS_HEX_LEN && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A signing keypair together with its derived address.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
    address: String,
}

impl Keypair {
    /// Generates a fresh random keypair.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Derives a keypair deterministically from a seed string.
    ///
    /// The seed is hashed with SHA-256 and the digest is re-hashed until
    /// it is a valid non-zero scalar for the curve. The same seed always
    /// yields the same keypair.
    pub fn from_seed(seed: &str) -> Self {
        let mut candidate: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        loop {
            if let Ok(signing) = SigningKey::from_slice(&candidate) {
                return Self::from_signing_key(signing);
            }
            candidate = Sha256::digest(candidate).into();
        }
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let point = signing.verifying_key().to_encoded_point(false);
        // Drop the SEC1 0x04 tag, keeping the raw x || y coordinates.
        let address = hex::encode(&point.as_bytes()[1..]);
        Self { signing, address }
    }

    /// The hex address of this keypair's public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Signs a message, returning the hex `r || s` signature.
    pub fn sign(&self, msg: &str) -> String {
        let signature: Signature = self.signing.sign(msg.as_bytes());
        hex::encode(signature.to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The signing key stays out of debug output.
        f.debug_struct("Keypair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
