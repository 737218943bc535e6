//! unik - validating admission webhook for unique Service annotation values

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use unik_common::config::RegistryConfig;
use unik_common::telemetry::{init_telemetry, TelemetryConfig};
use unik_common::{
    DEFAULT_LIST_TIMEOUT_SECS, DEFAULT_TLS_CERT_PATH, DEFAULT_TLS_KEY_PATH, DEFAULT_WEBHOOK_ADDR,
};
use unik_validator::{ScopeRegistry, Validator};
use unik_webhook::lister::DEFAULT_PAGE_SIZE;
use unik_webhook::server::{abort_after_grace, shutdown_signal};
use unik_webhook::{run_server, webhook_router, KubeServiceLister, ServerConfig, WebhookState};

/// unik - reject Services that reuse a protected annotation value
#[derive(Parser, Debug)]
#[command(name = "unik", version, about, long_about = None)]
struct Cli {
    /// Address to serve the webhook on
    #[arg(long, env = "UNIK_ADDR", default_value = DEFAULT_WEBHOOK_ADDR)]
    addr: SocketAddr,

    /// PEM certificate chain for TLS
    #[arg(long, env = "UNIK_TLS_CERT", default_value = DEFAULT_TLS_CERT_PATH)]
    cert: PathBuf,

    /// PEM private key for TLS
    #[arg(long, env = "UNIK_TLS_KEY", default_value = DEFAULT_TLS_KEY_PATH)]
    key: PathBuf,

    /// Serve plain HTTP (local testing only)
    #[arg(long, env = "UNIK_PLAINTEXT")]
    plaintext: bool,

    /// YAML file mapping scopes to protected annotation keys
    ///
    /// Without it only `ncp/snat_pool` is protected, cluster-wide.
    #[arg(long, env = "UNIK_CONFIG")]
    config: Option<PathBuf>,

    /// Deadline for each Service list call, in seconds
    #[arg(long, env = "UNIK_LIST_TIMEOUT_SECS", default_value_t = DEFAULT_LIST_TIMEOUT_SECS)]
    list_timeout_secs: u64,

    /// Services fetched per list request when paging through a scope
    #[arg(long, env = "UNIK_LIST_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    list_page_size: u32,

    /// Log at debug level
    #[arg(long, env = "UNIK_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install aws-lc-rs crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        debug: cli.debug,
        ..Default::default()
    })
    .context("failed to initialize telemetry")?;

    let registry_config = match &cli.config {
        Some(path) => RegistryConfig::load(path).await?,
        None => RegistryConfig::default(),
    };
    let registry = Arc::new(ScopeRegistry::from_config(&registry_config));
    info!(
        scopes = registry.all_scopes().len(),
        config = ?cli.config,
        "Loaded protected annotations"
    );
    if registry.has_cross_scope_conflict() {
        warn!("Some annotations are protected both cluster-wide and in a namespace");
    }

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let validator = Validator::new(registry)
        .with_list_timeout(Duration::from_secs(cli.list_timeout_secs));
    // shutdown stops the listener; abort fires once the drain window is over
    let shutdown = CancellationToken::new();
    let abort = CancellationToken::new();
    let state = WebhookState::new(
        validator,
        Arc::new(KubeServiceLister::new(client).with_page_size(cli.list_page_size)),
        abort.clone(),
    );

    let server_config = if cli.plaintext {
        ServerConfig::plaintext(cli.addr)
    } else {
        ServerConfig::tls(cli.addr, cli.cert, cli.key)
    };

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });
    tokio::spawn(abort_after_grace(
        shutdown.clone(),
        abort,
        server_config.shutdown_grace,
    ));

    run_server(server_config, webhook_router(Arc::new(state)), shutdown).await?;
    Ok(())
}
