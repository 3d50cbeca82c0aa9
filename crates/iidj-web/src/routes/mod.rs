pub mod iid;
pub mod iid_keys;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/iid", post(iid::issue_document))
        .route("/iid_keys", post(iid_keys::publish_keys))
        .with_state(state)
}
