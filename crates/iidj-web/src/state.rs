use std::str::FromStr;
use std::sync::Arc;

use iidj_keys::KeyManager;
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub struct AppState {
    pub key_manager: Arc<dyn KeyManager>,
    /// Signature algorithm matching the manager's key type.
    pub algorithm: Algorithm,
}

impl AppState {
    pub fn new(key_manager: Arc<dyn KeyManager>) -> Result<Self, ApiError> {
        let name = key_manager.key_type().signature_algorithm()?;
        let algorithm = Algorithm::from_str(name)
            .map_err(|e| ApiError::Internal(format!("unknown signature algorithm {name}: {e}")))?;
        Ok(Self {
            key_manager,
            algorithm,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}
