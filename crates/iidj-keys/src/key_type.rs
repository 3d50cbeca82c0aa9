use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{KeyError, Result};

/// Asymmetric algorithm family and parameter size used for every key pair a
/// manager generates.
///
/// Discriminants match the numeric values used on the wire by the metadata
/// service, so they must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KeyType {
    #[default]
    Unspecified = 0,
    #[serde(rename = "EC_P256")]
    EcP256 = 1,
    #[serde(rename = "EC_P384")]
    EcP384 = 2,
    #[serde(rename = "RSA_2048")]
    Rsa2048 = 4,
    #[serde(rename = "RSA_4096")]
    Rsa4096 = 5,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Unspecified => "UNSPECIFIED",
            KeyType::EcP256 => "EC_P256",
            KeyType::EcP384 => "EC_P384",
            KeyType::Rsa2048 => "RSA_2048",
            KeyType::Rsa4096 => "RSA_4096",
        }
    }

    /// JWS `alg` value for signatures made with keys of this type.
    pub fn signature_algorithm(&self) -> Result<&'static str> {
        match self {
            KeyType::EcP256 => Ok("ES256"),
            KeyType::EcP384 => Ok("ES384"),
            KeyType::Rsa2048 | KeyType::Rsa4096 => Ok("RS256"),
            KeyType::Unspecified => Err(KeyError::UnsupportedKeyType(self.to_string())),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EC_P256" => Ok(KeyType::EcP256),
            "EC_P384" => Ok(KeyType::EcP384),
            "RSA_2048" => Ok(KeyType::Rsa2048),
            "RSA_4096" => Ok(KeyType::Rsa4096),
            _ => Err(KeyError::UnsupportedKeyType(s.to_string())),
        }
    }
}
