//! Unsigned and signed transactions, and the block-formation wrapper.

use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use shared::{LedgerError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::account::AccountId;
use crate::signature::{self, Signature};

/// An unsigned value transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tx {
    pub from: AccountId,
    pub to: AccountId,
    pub value: u64,
    pub tip: u64,
    pub chain_id: u16,
    #[serde(with = "hex_data")]
    pub data: Vec<u8>,
    pub nonce: u64,
}

impl Tx {
    /// Validates that both addresses are well-formed. Does not check
    /// `from != to` or `value > 0` — those belong to [`SignedTx::is_valid`].
    pub fn new(
        from: AccountId,
        to: AccountId,
        value: u64,
        tip: u64,
        chain_id: u16,
        data: Vec<u8>,
        nonce: u64,
    ) -> Result<Self> {
        if !from.is_valid() {
            return Err(LedgerError::InvalidTransaction("invalid from account".into()));
        }
        if !to.is_valid() {
            return Err(LedgerError::InvalidTransaction("invalid to account".into()));
        }
        Ok(Self {
            from,
            to,
            value,
            tip,
            chain_id,
            data,
            nonce,
        })
    }

    /// Signs this transaction, producing a [`SignedTx`].
    pub fn sign(self, secret_key: &SecretKey) -> Result<SignedTx> {
        let digest = signature::stamp(&self)?;
        let sig = signature::sign_digest(&digest, secret_key);
        Ok(SignedTx {
            tx: self,
            v: sig.v,
            r: sig.r,
            s: sig.s,
        })
    }
}

/// A [`Tx`] plus its secp256k1 signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTx {
    #[serde(flatten)]
    pub tx: Tx,
    pub v: u8,
    pub r: shared::hash::U256Bytes,
    pub s: shared::hash::U256Bytes,
}

impl SignedTx {
    fn signature(&self) -> Signature {
        Signature {
            v: self.v,
            r: self.r,
            s: self.s,
        }
    }

    /// Full validity check: addresses, non-self-transfer, positive value,
    /// in-range signature values, and a recovered address that matches
    /// `from`.
    pub fn is_valid(&self) -> Result<()> {
        if !self.tx.from.is_valid() {
            return Err(LedgerError::InvalidTransaction("invalid from account".into()));
        }
        if !self.tx.to.is_valid() {
            return Err(LedgerError::InvalidTransaction("invalid to account".into()));
        }
        if self.tx.value == 0 {
            return Err(LedgerError::InvalidTransaction("value must be > 0".into()));
        }
        if self.tx.from == self.tx.to {
            return Err(LedgerError::InvalidTransaction(
                "from and to must differ".into(),
            ));
        }
        let sig = self.signature();
        if !signature::validate_signature_values(&sig) {
            return Err(LedgerError::InvalidTransaction(
                "invalid signature values".into(),
            ));
        }

        let recovered = self.from_address()?;
        if recovered != self.tx.from {
            return Err(LedgerError::InvalidTransaction(
                "signature does not match from account".into(),
            ));
        }
        Ok(())
    }

    fn from_address(&self) -> Result<AccountId> {
        let digest = signature::stamp(&self.tx)?;
        signature::recover_account_id(&digest, &self.signature())
    }

    /// `0x` + 130 hex characters.
    pub fn signature_string(&self) -> String {
        self.signature().to_hex_string()
    }
}

/// A [`SignedTx`] with the timestamp and gas metadata recorded when it was
/// pulled into a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockTx {
    #[serde(flatten)]
    pub signed_tx: SignedTx,
    pub timestamp_ms: u64,
    pub gas_price: u64,
    pub gas_units: u64,
}

impl BlockTx {
    pub fn new(signed_tx: SignedTx, gas_price: u64, gas_units: u64) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_millis() as u64;

        Self {
            signed_tx,
            timestamp_ms,
            gas_price,
            gas_units,
        }
    }

    pub fn from(&self) -> &AccountId {
        &self.signed_tx.tx.from
    }

    pub fn nonce(&self) -> u64 {
        self.signed_tx.tx.nonce
    }

    pub fn tip(&self) -> u64 {
        self.signed_tx.tx.tip
    }

    /// `gas_units * gas_price`.
    pub fn fee(&self) -> u64 {
        self.gas_units * self.gas_price
    }
}

/// A value that can stand as a Merkle-tree leaf: a content hash and an
/// equality check. Blanket-implemented wherever needed rather than leaked
/// through the public API.
pub trait Hashable {
    fn merkle_hash(&self) -> Result<[u8; 32]>;
    fn merkle_eq(&self, other: &Self) -> bool;
}

impl Hashable for BlockTx {
    /// Decodes the `0x`-prefixed hex of `hash_json(self)` back into raw
    /// bytes, so the Merkle layer hashes bytes rather than hex text.
    fn merkle_hash(&self) -> Result<[u8; 32]> {
        let hex_hash = shared::hash_json(self);
        let bytes = hex::decode(hex_hash.trim_start_matches("0x"))
            .map_err(|e| LedgerError::InvalidTransaction(format!("bad hash encoding: {e}")))?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Same nonce and identical canonicalised signature bytes.
    fn merkle_eq(&self, other: &Self) -> bool {
        self.nonce() == other.nonce() && self.signed_tx.signature_string() == other.signed_tx.signature_string()
    }
}

mod hex_data {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::rand::thread_rng;
    use secp256k1::Secp256k1;

    fn account(byte: u8) -> AccountId {
        AccountId::new(format!("0x{}", hex::encode([byte; 20]))).unwrap()
    }

    fn keypair() -> SecretKey {
        SecretKey::new(&mut thread_rng())
    }

    #[test]
    fn sign_then_recover_produces_a_valid_signed_tx() {
        let secp = Secp256k1::new();
        let secret_key = keypair();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let from = signature::address_from_public_key(&public_key);
        let to = account(0xBB);

        let tx = Tx::new(from.clone(), to, 100, 5, 1, vec![], 0).unwrap();
        let signed = tx.sign(&secret_key).unwrap();

        assert!(signed.is_valid().is_ok());
        assert_eq!(signed.from_address().unwrap(), from);
    }

    #[test]
    fn rejects_self_transfer() {
        let secp = Secp256k1::new();
        let secret_key = keypair();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let from = signature::address_from_public_key(&public_key);

        let tx = Tx::new(from.clone(), from, 100, 5, 1, vec![], 0).unwrap();
        let signed = tx.sign(&secret_key).unwrap();
        assert!(signed.is_valid().is_err());
    }

    #[test]
    fn block_tx_equality_considers_nonce_and_signature() {
        let secp = Secp256k1::new();
        let secret_key = keypair();
        let public_key = secp256k1::PublicKey::from_secret_key(&secp, &secret_key);
        let from = signature::address_from_public_key(&public_key);
        let to = account(0xBB);

        let tx = Tx::new(from, to, 100, 5, 1, vec![], 0).unwrap();
        let signed = tx.sign(&secret_key).unwrap();
        let block_tx = BlockTx::new(signed.clone(), 1, 1);
        let block_tx2 = BlockTx::new(signed, 1, 1);

        assert!(block_tx.merkle_eq(&block_tx2));
    }
}
