//! # aggx-server: HTTP Service for the Aggregation Planner
//!
//! This binary crate exposes the streaming-aggregate implementation step as a network
//! service. A caller describes a logical aggregate and the input it reads; the server
//! generates the physical alternatives, costs them, picks the cheapest one that
//! satisfies the requested properties and returns it as an executable operator tree.
//!
//! ## Architecture
//!
//! ```text
//! Query coordinator
//!   |
//!   | HTTP POST /aggregate/plan (JSON)
//!   v
//! aggx-server (this binary)
//!   |
//!   +-> Implementation rules (streaming aggregate, sort enforcer)
//!   +-> Cost model + winner selection
//!   +-> Operator conversion
//!   |
//!   | HTTP response (alternatives, winner explain text, operator tree)
//!   v
//! Query coordinator
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`           - Health check
//! - `GET  /settings`         - Planner settings used when a request has none
//! - `POST /aggregate/plan`   - Plan a logical aggregate
//!
//! ## Configuration
//!
//! See `state::ServerConfig` for the environment variables. Logging is controlled by
//! the `RUST_LOG` environment variable (defaults to `aggx=debug`).

mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The default filter shows debug-level messages from the aggx crates; override
    // with RUST_LOG for more or less detail.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("aggx=debug".parse()?))
        .init();

    let config = state::ServerConfig::from_env()?;
    let listen_addr = config.listen_addr;
    let state = Arc::new(state::AppState::new(config));

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/settings", get(routes::settings))
        .route("/aggregate/plan", post(routes::plan_aggregate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("aggx-server listening on http://{}", listen_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
