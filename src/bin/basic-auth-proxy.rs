//! Basic-auth gating route service
//!
//! Gates an arbitrary forwarded URL behind HTTP Basic credentials, for
//! use as a Cloud Foundry route service.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use observability_bridge::proxy::{router, AuthProxy};
use observability_bridge::telemetry;

#[derive(Parser, Debug)]
#[command(name = "basic-auth-proxy")]
#[command(about = "Basic-auth gate in front of a forwarded URL")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    port: u16,

    /// Username required by the gate
    #[arg(long, env = "AUTH_USERNAME")]
    auth_username: String,

    /// Password required by the gate
    #[arg(long, env = "AUTH_PASSWORD")]
    auth_password: String,

    /// Accept invalid TLS certificates from the forwarded URL
    #[arg(long, env = "SKIP_SSL_VALIDATION")]
    skip_ssl_validation: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    telemetry::init_tracing(&args.log_level);

    let proxy = AuthProxy::with_tls_validation(
        args.auth_username,
        args.auth_password,
        !args.skip_ssl_validation,
    );

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("could not bind on port {}", args.port))?;
    info!(port = args.port, "proxy listening");

    axum::serve(listener, router(proxy))
        .await
        .context("proxy server failed")?;

    Ok(())
}
