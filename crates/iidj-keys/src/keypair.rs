use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::ZeroizeOnDrop;

use crate::error::{KeyError, Result};

/// One generated asymmetric key pair.
///
/// Immutable once created. The private half is wiped from memory when the
/// value is dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct KeyPair {
    /// Key pair identifier, used as `kid` in JWS headers and JWKs.
    #[zeroize(skip)]
    pub id: String,
    /// DER encoded private key.
    #[serde(rename = "privateKey", with = "base64_bytes")]
    pub private_key: Vec<u8>,
    /// DER encoded public key (SubjectPublicKeyInfo).
    #[serde(rename = "publicKey", with = "base64_bytes")]
    #[zeroize(skip)]
    pub public_key: Vec<u8>,
    #[serde(rename = "issueAt")]
    #[zeroize(skip)]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "expireAt")]
    #[zeroize(skip)]
    pub expires_at: DateTime<Utc>,
}

impl KeyPair {
    /// Build a key pair from encoded key material. The id is always derived
    /// from the public key, never supplied by the caller.
    pub fn new(
        private_key: Vec<u8>,
        public_key: Vec<u8>,
        issued_at: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self> {
        let expires_at = issued_at.checked_add_signed(lifetime).ok_or_else(|| {
            KeyError::Config(format!(
                "key lifetime of {lifetime} from {issued_at} is out of range"
            ))
        })?;
        Ok(Self {
            id: key_id(&public_key),
            private_key,
            public_key,
            issued_at,
            expires_at,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.expires_at - self.issued_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("id", &self.id)
            .field("private_key", &"[REDACTED]")
            .field("public_key_len", &self.public_key.len())
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Hex SHA-256 of a DER encoded public key.
pub fn key_id(public_der: &[u8]) -> String {
    hex::encode(Sha256::digest(public_der))
}

/// Serde helper for Vec<u8> as standard base64.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        use serde::de::Error;
        let s = String::deserialize(d)?;
        STANDARD.decode(s.as_bytes()).map_err(D::Error::custom)
    }
}
