use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use sha3::Keccak256;

/// Hex-encoded, `0x`-prefixed all-zero hash, returned when canonical-JSON
/// serialisation fails.
pub const ZERO_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Hashes `value`'s canonical JSON encoding (field order as declared, no
/// insignificant whitespace — exactly what `serde_json::to_vec` produces for
/// a derived `Serialize` impl) with SHA-256, returning lowercase `0x`-hex.
///
/// Falls back to [`ZERO_HASH`] if serialisation fails, matching the
/// reference behaviour of never panicking on hash of an unmarshalable value.
pub fn hash_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let digest = Sha256::digest(&bytes);
            format!("0x{}", hex::encode(digest))
        }
        Err(_) => ZERO_HASH.to_string(),
    }
}

/// Raw Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::Digest as _;
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

/// Returns `true` if `hash_hex` (with or without its `0x` prefix) has at
/// least `difficulty` leading hex `'0'` digits.
pub fn leading_zero_hex_digits(hash_hex: &str) -> u32 {
    let body = hash_hex.strip_prefix("0x").unwrap_or(hash_hex);
    body.chars().take_while(|c| *c == '0').count() as u32
}

/// A fixed-width 32-byte integer, serialised as a `0x`-prefixed hex string.
///
/// Used for the `R`/`S` components of a signature: left-padding to 32 bytes
/// avoids the short-encoding bugs a variable-length big-integer encoding
/// invites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct U256Bytes(pub [u8; 32]);

impl U256Bytes {
    pub fn from_be_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        let start = 32usize.saturating_sub(bytes.len());
        out[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Serialize for U256Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for U256Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(stripped).map_err(DeError::custom)?;
        if bytes.len() != 32 {
            return Err(DeError::custom("expected a 32-byte hex string"));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }
}
