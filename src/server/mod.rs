mod handlers;
mod routes;

pub use routes::create_router;

use crate::app_state::AppState;
use crate::config::ServerSettings;
use crate::error::{Result, ServerError};
use std::net::SocketAddr;
use std::sync::Arc;

pub async fn run_server(app_state: Arc<AppState>, settings: &ServerSettings) -> Result<()> {
    let app: axum::Router = routes::create_router(app_state);

    let addr = SocketAddr::new(
        settings
            .host
            .parse()
            .map_err(|e| ServerError::Init(format!("Invalid host: {}", e)))?,
        settings.port,
    );
    tracing::info!("Listening on {}", addr);
    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

    Ok(())
}
