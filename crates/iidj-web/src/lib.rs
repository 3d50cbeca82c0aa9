mod error;
mod jwk;
mod jws;
mod models;
mod routes;
mod state;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

pub use error::ApiError;
pub use jws::DOCUMENT_TYPE;
pub use models::{DOCUMENT_LIFETIME_SECS, IidClaims, IidResponse, RequestData};
pub use routes::build_router;
pub use state::{AppState, WebConfig};

/// Serve the identity document endpoints until `shutdown` resolves.
pub async fn start_server(
    config: WebConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = config.listen_addr.parse()?;
    tracing::info!("Starting identity document service on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
