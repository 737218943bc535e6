//! Webhook HTTPS server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::WebhookError;

/// Time in-flight requests get to finish once shutdown starts
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Serving certificate and key, PEM encoded on disk
#[derive(Clone, Debug)]
pub struct TlsConfig {
    /// Certificate chain path
    pub cert_path: PathBuf,
    /// Private key path
    pub key_path: PathBuf,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// TLS material; `None` serves plain HTTP
    pub tls: Option<TlsConfig>,
    /// Drain period after shutdown is requested
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// HTTPS server on `addr`
    pub fn tls(addr: SocketAddr, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            addr,
            tls: Some(TlsConfig {
                cert_path: cert_path.into(),
                key_path: key_path.into(),
            }),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Plain HTTP server on `addr`, for local testing behind a TLS proxy
    pub fn plaintext(addr: SocketAddr) -> Self {
        Self {
            addr,
            tls: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// Serve `app` until `shutdown` is cancelled, then drain in-flight requests
pub async fn run_server(
    config: ServerConfig,
    app: Router,
    shutdown: CancellationToken,
) -> Result<(), WebhookError> {
    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        let grace = config.shutdown_grace;
        async move {
            shutdown.cancelled().await;
            info!(grace_secs = grace.as_secs(), "Shutting down webhook server");
            handle.graceful_shutdown(Some(grace));
        }
    });

    match config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|e| {
                    WebhookError::Tls(format!(
                        "failed to load {} / {}: {}",
                        tls.cert_path.display(),
                        tls.key_path.display(),
                        e
                    ))
                })?;

            info!(addr = %config.addr, "Starting webhook server");
            axum_server::bind_rustls(config.addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            warn!(addr = %config.addr, "Starting webhook server without TLS");
            axum_server::bind(config.addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    info!("Webhook server stopped");
    Ok(())
}

/// Cancel `abort` once `shutdown` has been cancelled for `grace`.
///
/// Validations watch `abort`, not `shutdown`, so requests already in flight
/// when shutdown starts get the whole drain window to finish.
pub async fn abort_after_grace(shutdown: CancellationToken, abort: CancellationToken, grace: Duration) {
    tokio::select! {
        _ = abort.cancelled() => return,
        _ = shutdown.cancelled() => {}
    }
    tokio::time::sleep(grace).await;
    if !abort.is_cancelled() {
        warn!(grace_secs = grace.as_secs(), "Drain window elapsed, aborting in-flight validations");
        abort.cancel();
    }
}

/// Resolve once SIGINT or SIGTERM is received
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    #[tokio::test]
    async fn test_missing_certificate_is_a_tls_error() {
        let config = ServerConfig::tls(
            "127.0.0.1:0".parse().unwrap(),
            "/nonexistent/tls.crt",
            "/nonexistent/tls.key",
        );

        let err = run_server(config, Router::new(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, WebhookError::Tls(_)));
        assert!(err.to_string().contains("/nonexistent/tls.crt"));
    }

    #[tokio::test]
    async fn test_plaintext_server_stops_on_cancel() {
        let shutdown = CancellationToken::new();
        let app = Router::new().route("/healthz", get(|| async { "ok" }));
        let server = tokio::spawn(run_server(
            ServerConfig::plaintext("127.0.0.1:0".parse().unwrap()),
            app,
            shutdown.clone(),
        ));

        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .expect("server should stop")
            .expect("server task should not panic");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_validations_outlive_shutdown_until_grace_elapses() {
        let shutdown = CancellationToken::new();
        let abort = CancellationToken::new();
        tokio::spawn(abort_after_grace(
            shutdown.clone(),
            abort.clone(),
            Duration::from_millis(100),
        ));

        shutdown.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!abort.is_cancelled(), "in-flight validations cancelled before the drain window");

        tokio::time::timeout(Duration::from_secs(5), abort.cancelled())
            .await
            .expect("validations should be aborted once the drain window elapses");
    }

    #[tokio::test]
    async fn test_abort_without_shutdown_does_not_wait() {
        let abort = CancellationToken::new();
        abort.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            abort_after_grace(CancellationToken::new(), abort, Duration::from_secs(60)),
        )
        .await
        .expect("watcher should return once abort is already cancelled");
    }

    #[test]
    fn configs_use_default_grace() {
        let addr = "0.0.0.0:9090".parse().unwrap();
        assert_eq!(ServerConfig::plaintext(addr).shutdown_grace, DEFAULT_SHUTDOWN_GRACE);
        assert!(ServerConfig::tls(addr, "a", "b").tls.is_some());
    }
}
