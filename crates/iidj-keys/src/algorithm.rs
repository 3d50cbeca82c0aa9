//! Per-family key generation and decoding.
//!
//! Each algorithm family implements [`KeyAlgorithm`] once; the manager picks
//! the implementation from its [`KeyType`] at construction and never branches
//! on the key type again.
//!
//! Encodings on disk:
//! - EC private keys: SEC1 `ECPrivateKey` DER
//! - RSA private keys: PKCS#1 `RSAPrivateKey` DER
//! - all public keys: SubjectPublicKeyInfo DER

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::error::{KeyError, Result};
use crate::key_type::KeyType;

/// A decoded private signing key.
pub enum PrivateKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    Rsa(Box<RsaPrivateKey>),
}

impl PrivateKey {
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::P256(k) => PublicKey::P256(k.public_key()),
            PrivateKey::P384(k) => PublicKey::P384(k.public_key()),
            PrivateKey::Rsa(k) => PublicKey::Rsa(k.to_public_key()),
        }
    }

    /// DER form accepted by JOSE signers: PKCS#8 for EC keys, PKCS#1 for RSA.
    pub fn signing_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let encode_err = |e: &dyn fmt::Display| KeyError::Encode(e.to_string());
        let der = match self {
            PrivateKey::P256(k) => {
                use p256::pkcs8::EncodePrivateKey;
                let doc = k.to_pkcs8_der().map_err(|e| encode_err(&e))?;
                doc.as_bytes().to_vec()
            }
            PrivateKey::P384(k) => {
                use p384::pkcs8::EncodePrivateKey;
                let doc = k.to_pkcs8_der().map_err(|e| encode_err(&e))?;
                doc.as_bytes().to_vec()
            }
            PrivateKey::Rsa(k) => {
                let doc = k.to_pkcs1_der().map_err(|e| encode_err(&e))?;
                doc.as_bytes().to_vec()
            }
        };
        Ok(Zeroizing::new(der))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            PrivateKey::P256(_) => "P256",
            PrivateKey::P384(_) => "P384",
            PrivateKey::Rsa(_) => "Rsa",
        };
        f.debug_struct("PrivateKey")
            .field("kind", &kind)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A decoded public verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    Rsa(RsaPublicKey),
}

/// Raw public key parameters, big-endian, as carried in a JWK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyComponents {
    Ec { curve: Curve, x: Vec<u8>, y: Vec<u8> },
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

impl PublicKey {
    pub fn components(&self) -> PublicKeyComponents {
        match self {
            PublicKey::P256(k) => {
                use p256::elliptic_curve::sec1::ToEncodedPoint;
                let point = k.to_encoded_point(false);
                PublicKeyComponents::Ec {
                    curve: Curve::P256,
                    x: point.x().map(|x| x.to_vec()).unwrap_or_default(),
                    y: point.y().map(|y| y.to_vec()).unwrap_or_default(),
                }
            }
            PublicKey::P384(k) => {
                use p384::elliptic_curve::sec1::ToEncodedPoint;
                let point = k.to_encoded_point(false);
                PublicKeyComponents::Ec {
                    curve: Curve::P384,
                    x: point.x().map(|x| x.to_vec()).unwrap_or_default(),
                    y: point.y().map(|y| y.to_vec()).unwrap_or_default(),
                }
            }
            PublicKey::Rsa(k) => PublicKeyComponents::Rsa {
                n: k.n().to_bytes_be(),
                e: k.e().to_bytes_be(),
            },
        }
    }
}

/// Key generation and decoding for one algorithm family.
pub trait KeyAlgorithm: Send + Sync {
    fn key_type(&self) -> KeyType;

    /// Generate a fresh key pair. Returns `(private_der, public_der)`.
    fn generate(&self) -> Result<(Vec<u8>, Vec<u8>)>;

    fn decode_private(&self, der: &[u8]) -> Result<PrivateKey>;

    fn decode_public(&self, der: &[u8]) -> Result<PublicKey>;
}

/// Select the algorithm implementation for a key type.
pub fn algorithm_for(key_type: KeyType) -> Result<Box<dyn KeyAlgorithm>> {
    match key_type {
        KeyType::EcP256 => Ok(Box::new(EcAlgorithm::new(Curve::P256))),
        KeyType::EcP384 => Ok(Box::new(EcAlgorithm::new(Curve::P384))),
        KeyType::Rsa2048 => Ok(Box::new(RsaAlgorithm::new(2048))),
        KeyType::Rsa4096 => Ok(Box::new(RsaAlgorithm::new(4096))),
        KeyType::Unspecified => Err(KeyError::UnsupportedKeyType(
            "key type must be specified".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    P256,
    P384,
}

/// NIST elliptic-curve keys (ECDSA).
#[derive(Debug)]
pub struct EcAlgorithm {
    curve: Curve,
}

impl EcAlgorithm {
    pub fn new(curve: Curve) -> Self {
        Self { curve }
    }
}

fn generation_err(e: impl fmt::Display) -> KeyError {
    KeyError::Generation(e.to_string())
}

fn decode_err(e: impl fmt::Display) -> KeyError {
    KeyError::Decode(e.to_string())
}

impl KeyAlgorithm for EcAlgorithm {
    fn key_type(&self) -> KeyType {
        match self.curve {
            Curve::P256 => KeyType::EcP256,
            Curve::P384 => KeyType::EcP384,
        }
    }

    fn generate(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        match self.curve {
            Curve::P256 => {
                use p256::pkcs8::EncodePublicKey;
                let secret = p256::SecretKey::random(&mut OsRng);
                let private_der = secret.to_sec1_der().map_err(generation_err)?;
                let public_der = secret
                    .public_key()
                    .to_public_key_der()
                    .map_err(generation_err)?;
                Ok((private_der.to_vec(), public_der.as_bytes().to_vec()))
            }
            Curve::P384 => {
                use p384::pkcs8::EncodePublicKey;
                let secret = p384::SecretKey::random(&mut OsRng);
                let private_der = secret.to_sec1_der().map_err(generation_err)?;
                let public_der = secret
                    .public_key()
                    .to_public_key_der()
                    .map_err(generation_err)?;
                Ok((private_der.to_vec(), public_der.as_bytes().to_vec()))
            }
        }
    }

    fn decode_private(&self, der: &[u8]) -> Result<PrivateKey> {
        match self.curve {
            Curve::P256 => p256::SecretKey::from_sec1_der(der)
                .map(PrivateKey::P256)
                .map_err(|e| decode_err(format!("P-256 private key: {e}"))),
            Curve::P384 => p384::SecretKey::from_sec1_der(der)
                .map(PrivateKey::P384)
                .map_err(|e| decode_err(format!("P-384 private key: {e}"))),
        }
    }

    fn decode_public(&self, der: &[u8]) -> Result<PublicKey> {
        match self.curve {
            Curve::P256 => {
                use p256::pkcs8::DecodePublicKey;
                p256::PublicKey::from_public_key_der(der)
                    .map(PublicKey::P256)
                    .map_err(|e| decode_err(format!("P-256 public key: {e}")))
            }
            Curve::P384 => {
                use p384::pkcs8::DecodePublicKey;
                p384::PublicKey::from_public_key_der(der)
                    .map(PublicKey::P384)
                    .map_err(|e| decode_err(format!("P-384 public key: {e}")))
            }
        }
    }
}

/// RSA keys with a fixed modulus size.
#[derive(Debug)]
pub struct RsaAlgorithm {
    bits: usize,
}

impl RsaAlgorithm {
    pub fn new(bits: usize) -> Self {
        Self { bits }
    }
}

impl KeyAlgorithm for RsaAlgorithm {
    fn key_type(&self) -> KeyType {
        if self.bits >= 4096 {
            KeyType::Rsa4096
        } else {
            KeyType::Rsa2048
        }
    }

    fn generate(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        use rsa::pkcs8::EncodePublicKey;
        let private = RsaPrivateKey::new(&mut OsRng, self.bits).map_err(generation_err)?;
        let private_der = private.to_pkcs1_der().map_err(generation_err)?;
        let public_der = private
            .to_public_key()
            .to_public_key_der()
            .map_err(generation_err)?;
        Ok((
            private_der.as_bytes().to_vec(),
            public_der.as_bytes().to_vec(),
        ))
    }

    fn decode_private(&self, der: &[u8]) -> Result<PrivateKey> {
        let private = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| decode_err(format!("RSA private key: {e}")))?;
        let bits = private.size() * 8;
        if bits != self.bits {
            return Err(decode_err(format!(
                "RSA private key has {bits} bits, expected {}",
                self.bits
            )));
        }
        Ok(PrivateKey::Rsa(Box::new(private)))
    }

    fn decode_public(&self, der: &[u8]) -> Result<PublicKey> {
        use rsa::pkcs8::DecodePublicKey;
        RsaPublicKey::from_public_key_der(der)
            .map(PublicKey::Rsa)
            .map_err(|e| decode_err(format!("RSA public key: {e}")))
    }
}
