use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime of an issued identity document, independent of key rotation.
pub const DOCUMENT_LIFETIME_SECS: i64 = 10 * 60;

/// Instance description sent by the compute metadata service (dynamic
/// vendordata request).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestData {
    /// The ID of the project that owns this instance.
    #[serde(rename = "project-id")]
    pub project_id: String,
    /// The UUID of this instance.
    #[serde(rename = "instance-id")]
    pub instance_id: String,
    /// The ID of the image used to boot this instance.
    #[serde(rename = "image-id")]
    pub image_id: String,
    /// As specified by the user at boot time. Never copied into a document.
    #[serde(rename = "user-data")]
    pub user_data: String,
    pub hostname: String,
    pub metadata: BTreeMap<String, String>,
}

/// Claims of a signed instance identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IidClaims {
    pub jti: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(rename = "instanceID")]
    pub instance_id: String,
    #[serde(rename = "imageID")]
    pub image_id: String,
    pub hostname: String,
    pub metadata: BTreeMap<String, String>,
    pub iat: i64,
    pub exp: i64,
}

impl IidClaims {
    pub fn new(request: RequestData, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            jti: Uuid::new_v4().to_string(),
            project_id: request.project_id,
            instance_id: request.instance_id,
            image_id: request.image_id,
            hostname: request.hostname,
            metadata: request.metadata,
            iat,
            exp: iat + DOCUMENT_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IidResponse {
    /// Compact JWS of the identity document.
    pub data: String,
}
