//! Minimal liveness endpoint for platform health probes.
//!
//! Two static routes, served from an independently spawned task. The server
//! never touches bot state; it only reports that the process is alive.

use axum::routing::get;
use axum::Router;
use tracing::info;

/// Body served at `/`
pub const STATUS_BODY: &str = "🟢 TUCL Bot Online";

/// Body served at `/ping`
pub const PING_BODY: &str = "🏓 Pong";

async fn home() -> &'static str {
    STATUS_BODY
}

async fn ping() -> &'static str {
    PING_BODY
}

fn router() -> Router {
    Router::new().route("/", get(home)).route("/ping", get(ping))
}

/// Serve the health routes until the process exits.
///
/// # Errors
///
/// Returns the bind or serve error; the caller logs it and keeps the bot
/// running without the endpoint.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Health-check server listening on port {port}");
    axum::serve(listener, router()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_return_fixed_bodies() {
        assert_eq!(home().await, "🟢 TUCL Bot Online");
        assert_eq!(ping().await, "🏓 Pong");
    }
}
