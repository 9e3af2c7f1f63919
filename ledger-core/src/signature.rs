//! secp256k1 signing, recovery, and the transaction "stamp" preimage.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::Serialize;
use shared::hash::U256Bytes;
use shared::{keccak256, LedgerError, Result};

use crate::account::AccountId;

/// Added to the recovery id (0 or 1) before the byte is stored, so the two
/// valid parity values can't be confused with a bare recovery id from
/// another signing scheme.
pub const SIG_ID_OFFSET: u8 = 29;

/// Fixed prefix for the salt string mixed into the signed digest.
const SALT_PREFIX: &str = "ledger-node salt";

/// A 65-byte `[R | S | v]` signature, where `v` already carries
/// [`SIG_ID_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct Signature {
    pub v: u8,
    pub r: U256Bytes,
    pub s: U256Bytes,
}

impl Signature {
    /// Hex-encodes the signature as `0x` + 130 hex characters (`r ++ s ++ v`).
    pub fn to_hex_string(&self) -> String {
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(self.r.as_bytes());
        bytes.extend_from_slice(self.s.as_bytes());
        bytes.push(self.v);
        format!("0x{}", hex::encode(bytes))
    }

    fn recovery_id(&self) -> Result<RecoveryId> {
        if self.v != SIG_ID_OFFSET && self.v != SIG_ID_OFFSET + 1 {
            return Err(LedgerError::InvalidTransaction(
                "signature parity out of range".into(),
            ));
        }
        let raw = self.v - SIG_ID_OFFSET;
        RecoveryId::from_i32(raw as i32)
            .map_err(|_| LedgerError::InvalidTransaction("invalid recovery id".into()))
    }

    fn to_recoverable(&self) -> Result<RecoverableSignature> {
        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(self.r.as_bytes());
        compact[32..].copy_from_slice(self.s.as_bytes());
        RecoverableSignature::from_compact(&compact, self.recovery_id()?)
            .map_err(|e| LedgerError::InvalidTransaction(format!("malformed signature: {e}")))
    }
}

/// Computes the Keccak-256 digest that gets signed: the canonical JSON of
/// `value`, concatenated with the canonical JSON of a length-parameterised
/// salt string.
pub fn stamp<T: Serialize>(value: &T) -> Result<[u8; 32]> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| LedgerError::InvalidTransaction(format!("cannot serialise tx: {e}")))?;
    let salt = format!("{SALT_PREFIX} {}", payload.len());
    let salt_json = serde_json::to_vec(&salt).expect("a string always serialises");

    let mut preimage = Vec::with_capacity(payload.len() + salt_json.len());
    preimage.extend_from_slice(&payload);
    preimage.extend_from_slice(&salt_json);
    Ok(keccak256(&preimage))
}

/// Signs `digest` with `secret_key`, returning a [`Signature`] with `v`
/// already offset by [`SIG_ID_OFFSET`].
pub fn sign_digest(digest: &[u8; 32], secret_key: &SecretKey) -> Signature {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*digest);
    let recoverable = secp.sign_ecdsa_recoverable(&message, secret_key);
    let (recovery_id, compact) = recoverable.serialize_compact();

    Signature {
        v: recovery_id.to_i32() as u8 + SIG_ID_OFFSET,
        r: U256Bytes::from_be_slice(&compact[..32]),
        s: U256Bytes::from_be_slice(&compact[32..]),
    }
}

/// `true` iff `sig.v` is one of the two valid parity values and the
/// signature decodes into a curve-valid recoverable signature.
pub fn validate_signature_values(sig: &Signature) -> bool {
    if sig.r.is_zero() || sig.s.is_zero() {
        return false;
    }
    sig.to_recoverable().is_ok()
}

/// Recovers the public key that produced `sig` over `digest`, and derives
/// its [`AccountId`].
pub fn recover_account_id(digest: &[u8; 32], sig: &Signature) -> Result<AccountId> {
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    let recoverable = sig.to_recoverable()?;
    let public_key = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|e| LedgerError::InvalidTransaction(format!("signature recovery failed: {e}")))?;
    Ok(address_from_public_key(&public_key))
}

/// Derives the Ethereum-style 20-byte address from an uncompressed
/// secp256k1 public key: Keccak-256 of the 64-byte X||Y encoding, last 20
/// bytes, hex-encoded with a `0x` prefix.
pub fn address_from_public_key(public_key: &PublicKey) -> AccountId {
    let uncompressed = public_key.serialize_uncompressed();
    // Drop the leading 0x04 prefix byte before hashing.
    let digest = keccak256(&uncompressed[1..]);
    let address_bytes = &digest[12..];
    AccountId::new(format!("0x{}", hex::encode(address_bytes)))
        .expect("keccak-derived address is always 20 bytes of valid hex")
}
