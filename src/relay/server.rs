//! Relay HTTP server

use super::config::RelayConfig;
use super::handlers::{self, RelayState};
use super::upstream::Upstream;
use axum::{
    extract::Request,
    http::{header, HeaderName, Method},
    middleware::{self, Next},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Permissive CORS: any origin may call the relay
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

/// Create the relay router with all routes.
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route(
            "/chat",
            post(handlers::chat_handler).options(handlers::preflight),
        )
        .route(
            "/test-connection",
            post(handlers::test_connection_handler).options(handlers::preflight),
        )
        .route("/health", get(handlers::health_check))
        .fallback(handlers::fallback)
        .with_state(state)
        .layer(cors_layer())
        .layer(middleware::from_fn(logging_middleware))
}

/// Serve the relay on an already bound listener
pub async fn serve(listener: TcpListener, config: &RelayConfig) -> anyhow::Result<()> {
    let state = RelayState {
        upstream: Arc::new(Upstream::new(config)?),
    };
    let app = create_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Start the relay server
pub async fn start_server(config: RelayConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address {}:{}: {}", config.host, config.port, e))?;

    info!("Starting relay on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    serve(listener, &config).await
}

/// Logging middleware
async fn logging_middleware(req: Request, next: Next) -> axum::response::Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    info!("{} {} {} {:?}", method, uri, status, duration);

    response
}
