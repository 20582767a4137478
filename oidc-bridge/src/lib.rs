//! # oidc-bridge
//!
//! An OpenID Connect facade over a third-party OAuth2 provider that is not
//! OIDC compliant (no discovery, no `id_token`, no userinfo endpoint).
//!
//! The bridge sits between an identity broker that only speaks OIDC and the
//! provider. It keeps no sessions: the broker's context rides through the
//! provider's `state` parameter in an encoded envelope, and ID tokens are
//! synthesized per token request from the provider's profile.
//!
//! ## Endpoints
//!
//! - `GET /.well-known/openid-configuration`
//! - `GET /oauth/authorize`: redirect to the provider, forcing the web flow on mobile
//! - `GET /oauth/callback`: forward the code to the broker, or exchange it (legacy)
//! - `POST /oauth/token`: exchange the code and synthesize an unsigned ID token
//! - `GET /oauth/userinfo`
//! - `GET /.well-known/jwks.json`: placeholder key set
//!
//! ## Example
//!
//! ```rust,no_run
//! use oidc_bridge::{BridgeConfig, BridgeServer, HttpProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = BridgeConfig::new(
//!     "https://bridge.example.com".parse()?,
//!     "client-id",
//!     "client-secret",
//!     "https://app.example.com".parse()?,
//! );
//! let provider = Arc::new(HttpProvider::new(&config)?);
//! let bridge = BridgeServer::builder()
//!     .config(config)
//!     .provider(provider)
//!     .build()?;
//!
//! let app = bridge.router();
//! # Ok(())
//! # }
//! ```

pub mod claims;
pub mod config;
pub mod cors;
pub mod device;
pub mod error;
pub mod provider;
#[cfg(feature = "axum")]
pub mod server;
pub mod state;
pub mod token;

pub use config::BridgeConfig;
pub use error::{ConfigError, Error, Result, UpstreamError};
pub use provider::{HttpProvider, UpstreamProfile, UpstreamProvider, UpstreamToken};
#[cfg(feature = "axum")]
pub use server::{BridgeServer, BridgeServerBuilder};
pub use state::{CallbackTarget, StateEnvelope};
pub use token::{IdTokenIssuer, UnsignedIdToken};
