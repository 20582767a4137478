use miette::{IntoDiagnostic, Result, WrapErr, miette};
use oidc_bridge::{BridgeServer, HttpProvider};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

mod settings;

use settings::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "oidc_bridge=debug,oidc_bridge_server=debug,info"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "invalid configuration");
            return Err(miette!("invalid configuration: {:#}", e));
        }
    };

    let provider = HttpProvider::new(&settings.bridge)
        .into_diagnostic()
        .wrap_err("failed to build upstream HTTP client")?;

    let bridge = BridgeServer::builder()
        .config(settings.bridge)
        .provider(Arc::new(provider))
        .build()
        .into_diagnostic()
        .wrap_err("failed to build bridge server")?;

    tracing::info!(
        issuer = %bridge.config().public_url,
        callback = %bridge.config().callback_url(),
        "bridge configured"
    );

    if bridge.config().allowed_redirect_origins.is_empty() {
        tracing::warn!(
            "BRIDGE_ALLOWED_REDIRECT_ORIGINS is empty, only the direct callback flow will work"
        );
    }
    if !bridge.config().require_client_auth {
        tracing::warn!("broker client authentication is disabled on the token endpoint");
    }

    let app = bridge.router().layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(settings.bind_address)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to bind to {}", settings.bind_address))?;
    tracing::info!("OIDC bridge listening on {}", settings.bind_address);

    axum::serve(listener, app)
        .await
        .into_diagnostic()
        .wrap_err("server error")?;
    Ok(())
}
