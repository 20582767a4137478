//! Bridge running against an in-memory stand-in for the third party.
//!
//! Lets a broker be wired up locally without real provider credentials.
//! `/oauth/authorize` still redirects to the configured provider URL, so
//! complete the round trip by calling `/oauth/callback?code=anything&state=...`
//! by hand.
//!
//! Run with:
//! ```
//! cargo run --example simple_server
//! ```

mod memory_provider;

use memory_provider::MemoryProvider;
use miette::{Context, IntoDiagnostic};
use oidc_bridge::{BridgeConfig, BridgeServer};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "simple_server=debug,oidc_bridge=debug,info"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let config = BridgeConfig::new(
        url::Url::parse("http://127.0.0.1:3000").unwrap(),
        "demo-client",
        "demo-secret",
        url::Url::parse("http://127.0.0.1:5173").unwrap(),
    )
    .with_cors_origins(vec!["http://127.0.0.1:8080".to_string()])
    .with_allowed_redirect_origins(vec!["http://127.0.0.1:8080".to_string()]);

    let bridge = BridgeServer::builder()
        .config(config)
        .provider(Arc::new(MemoryProvider::new()))
        .build()
        .into_diagnostic()
        .wrap_err("failed to build bridge server")?;

    let app = bridge.router();

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    tracing::info!("OIDC bridge listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()
        .wrap_err("failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .into_diagnostic()
        .wrap_err("server error")?;

    Ok(())
}
