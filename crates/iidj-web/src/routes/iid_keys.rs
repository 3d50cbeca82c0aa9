use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use jsonwebtoken::jwk::JwkSet;

use crate::error::ApiError;
use crate::jwk;
use crate::state::AppState;

/// Publish every key a current document may be signed with.
pub async fn publish_keys(State(state): State<Arc<AppState>>) -> Result<Json<JwkSet>, ApiError> {
    let keys = state.key_manager.get_public_keys()?;
    Ok(Json(jwk::key_set(&keys, state.algorithm)?))
}
