//! Service discovery daemon
//!
//! Polls the managed-service catalog, enrolls eligible services with the
//! prometheus integration, resolves enrolled services and publishes them
//! as scrape targets.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use observability_bridge::catalog::{AivenCatalog, Catalog};
use observability_bridge::daemon::DaemonHandle;
use observability_bridge::discoverer::Discoverer;
use observability_bridge::fetcher::{load_service_names, Fetcher, FilteredServices, ServiceSource};
use observability_bridge::integrator::Integrator;
use observability_bridge::resolver::DnsResolver;
use observability_bridge::telemetry;
use observability_bridge::writer::FileTargetWriter;

const USER_AGENT: &str = "govuk-paas-aiven-service-discovery";

#[derive(Parser, Debug)]
#[command(name = "aiven-service-discovery")]
#[command(about = "Discovers Aiven services and publishes prometheus scrape targets")]
struct Args {
    /// Aiven API token to use
    #[arg(long)]
    aiven_api_token: String,

    /// Aiven project to discover
    #[arg(long)]
    aiven_project: String,

    /// Aiven prometheus service integration endpoint to use
    #[arg(long)]
    aiven_prometheus_endpoint_id: String,

    /// File path to where targets will be written
    #[arg(long)]
    service_discovery_target_path: String,

    /// File path where the names of services to scrape lives
    #[arg(long)]
    service_names_file: Option<String>,

    /// Port on which prometheus metrics will be exposed via /metrics
    #[arg(long, default_value_t = 9274)]
    prometheus_listen_port: u16,

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

    let catalog: Arc<dyn Catalog> = Arc::new(
        AivenCatalog::new(&args.aiven_api_token, USER_AGENT)
            .context("could not create catalog client")?,
    );

    let fetcher = Arc::new(Fetcher::new(&args.aiven_project, catalog.clone()));

    let source: Arc<dyn ServiceSource> = match &args.service_names_file {
        Some(path) => {
            let names = load_service_names(path)
                .await
                .with_context(|| format!("could not read service names file {path}"))?;
            info!(count = names.len(), "restricting discovery to named services");
            Arc::new(FilteredServices::new(fetcher.clone(), names))
        }
        None => fetcher.clone(),
    };

    let integrator = Arc::new(Integrator::new(
        &args.aiven_project,
        &args.aiven_prometheus_endpoint_id,
        catalog,
        source.clone(),
    ));

    let discoverer = Arc::new(Discoverer::new(
        source,
        Arc::new(DnsResolver::new()),
        Arc::new(FileTargetWriter::new(&args.service_discovery_target_path)),
    ));

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

    let fetcher_handle = DaemonHandle::start(fetcher);
    let integrator_handle = DaemonHandle::start(integrator);
    let discoverer_handle = DaemonHandle::start(discoverer);

    shutdown_signal().await;
    info!("received shutdown signal");

    tokio::join!(
        fetcher_handle.stop(),
        integrator_handle.stop(),
        discoverer_handle.stop(),
    );

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
