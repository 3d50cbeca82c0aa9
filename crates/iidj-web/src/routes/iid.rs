use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use crate::error::ApiError;
use crate::jws;
use crate::models::{IidClaims, IidResponse, RequestData};
use crate::state::AppState;

/// Sign an identity document for the instance described in the body.
///
/// The body is parsed as JSON whatever its Content-Type.
pub async fn issue_document(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IidResponse>, ApiError> {
    let request: RequestData =
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidInput(e.to_string()))?;

    let (kid, private_key) = state.key_manager.get_private_key()?;
    let claims = IidClaims::new(request, chrono::Utc::now());
    let data = jws::sign(&claims, &kid, &private_key, state.algorithm)?;

    tracing::debug!(kid = %kid, instance = %claims.instance_id, jti = %claims.jti, "issued identity document");
    Ok(Json(IidResponse { data }))
}
