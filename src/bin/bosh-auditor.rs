//! Audit-event shipping daemon
//!
//! Tails the deployment director's audit events and forwards them to the
//! Splunk HTTP event collector, resuming from a durable cursor.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use observability_bridge::cursor::FileCursor;
use observability_bridge::daemon::DaemonHandle;
use observability_bridge::events::BoshEventClient;
use observability_bridge::shipper::Shipper;
use observability_bridge::sink::SplunkClient;
use observability_bridge::telemetry;

const CURSOR_NAME: &str = "bosh-auditor-splunk-shipper";

/// Cursor default when no file exists: 2016-01-01T00:00:00Z.
const DEFAULT_CURSOR_TIMESTAMP: i64 = 1_451_606_400;

#[derive(Parser, Debug)]
#[command(name = "bosh-auditor")]
#[command(about = "Ships BOSH audit events to a Splunk HTTP event collector")]
struct Args {
    /// Reserved: how far back to look on a cold start, in seconds
    #[arg(long, default_value_t = 10_800)]
    lookback_duration: u64,

    /// Port on which prometheus metrics will be exposed via /metrics
    #[arg(long, default_value_t = 9275)]
    prometheus_listen_port: u16,

    /// Client ID used to get a token for BOSH from UAA
    #[arg(long)]
    bosh_client_id: String,

    /// Client secret used to get a token for BOSH from UAA
    #[arg(long)]
    bosh_client_secret: String,

    /// Certificate authority used by the BOSH Director API in PEM format
    #[arg(long)]
    bosh_ca_cert: String,

    /// Certificate authority used by UAA in PEM format
    #[arg(long)]
    uaa_ca_cert: String,

    /// URL used for BOSH director
    #[arg(long)]
    bosh_url: String,

    /// URL used for UAA to authenticate with BOSH director
    #[arg(long)]
    uaa_url: String,

    /// Endpoint for Splunk HTTP Event Collector which will receive shipped events
    #[arg(long)]
    splunk_hec_endpoint: String,

    /// Token for Splunk HTTP Event Collector which will receive shipped events
    #[arg(long)]
    splunk_token: String,

    /// Persistent directory in which bosh-auditor stores cursor files
    #[arg(long)]
    cursor_dir: String,

    /// Environment in which bosh-auditor is deployed
    #[arg(long)]
    deploy_env: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    telemetry::init_tracing(&args.log_level);
    observability_bridge::metrics::register();

    if args.prometheus_listen_port == 0 {
        bail!("--prometheus-listen-port must be between 1 and 65535");
    }

    info!(
        lookback_duration_secs = args.lookback_duration,
        prometheus_listen_port = args.prometheus_listen_port,
        splunk_hec_endpoint = %args.splunk_hec_endpoint,
        "configured"
    );

    let cursor = Arc::new(FileCursor::new(
        CURSOR_NAME,
        &args.cursor_dir,
        DEFAULT_CURSOR_TIMESTAMP,
    ));

    let events = Arc::new(
        BoshEventClient::new(
            &args.bosh_url,
            &args.uaa_url,
            &args.bosh_client_id,
            &args.bosh_client_secret,
            Some(args.bosh_ca_cert.as_bytes()),
            Some(args.uaa_ca_cert.as_bytes()),
        )
        .context("could not create event client")?,
    );

    let sink = SplunkClient::new(&args.splunk_hec_endpoint, &args.splunk_token)
        .context("could not create sink client")?;

    let shipper = Arc::new(Shipper::new(&args.deploy_env, cursor, events, sink));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.prometheus_listen_port))
        .await
        .with_context(|| {
            format!(
                "could not bind metrics listener on port {}",
                args.prometheus_listen_port
            )
        })?;
    info!(port = args.prometheus_listen_port, "serving metrics");

    let (metrics_shutdown_tx, metrics_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let metrics_server = tokio::spawn(async move {
        let serve = axum::serve(listener, telemetry::metrics_router()).with_graceful_shutdown(
            async move {
                let _ = metrics_shutdown_rx.await;
            },
        );
        if let Err(e) = serve.await {
            tracing::error!(error = %e, "metrics server failed");
        }
    });

    let shipper_handle = DaemonHandle::start(shipper);

    shutdown_signal().await;
    info!("received shutdown signal");

    shipper_handle.stop().await;

    let _ = metrics_shutdown_tx.send(());
    let _ = metrics_server.await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
