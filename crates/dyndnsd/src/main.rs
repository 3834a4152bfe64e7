// # dyndnsd - Dynamic DNS Daemon
//
// Keeps Cloudflare A/AAAA records in step with the public addresses of a
// FRITZ!Box. This is a thin integration layer: all pipeline logic lives in
// dyndns-core, the daemon only wires components together.
//
// ```text
// FRITZ!Box ──SOAP poll──▶ Poller ───────┐
//                                        ├──▶ dispatch queue ──▶ Reconciler ──▶ Cloudflare
// FRITZ!Box ──GET /ip──▶ PushListener ───┘
//
// monitor ──GET /healthz──▶ StatusBoard
// scraper ──GET /metrics──▶ poll cycle timings
// ```
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Gateway polling
// - `FRITZBOX_ENDPOINT_URL`: Gateway URL, e.g. `http://fritz.box:49000`
// - `FRITZBOX_ENDPOINT_INTERVAL`: Poll interval, e.g. `3m` (polling is off without it)
// - `FRITZBOX_ENDPOINT_TIMEOUT`: Per-call timeout (default `5s`)
// - `DEVICE_LOCAL_ADDRESS_IPV6`: Local address whose host bits complete the routed prefix
//
// ### Cloudflare
// - `CLOUDFLARE_API_TOKEN`: Scoped API token
// - `CLOUDFLARE_API_EMAIL` / `CLOUDFLARE_API_KEY`: Deprecated global key
// - `CLOUDFLARE_ZONES_IPV4` / `CLOUDFLARE_ZONES_IPV6`: Comma-separated record names
//
// ### Push endpoint
// - `DYNDNS_SERVER_BIND`: Listen address, e.g. `:8080`
// - `DYNDNS_SERVER_USERNAME` / `DYNDNS_SERVER_PASSWORD`: Expected credentials
//
// ### Health endpoints
// - `METRICS_BIND`: Listen address for `/healthz`, `/liveness` and `/metrics`
// - `METRICS_TOKEN`: Optional `?token=` required by all three
//
// ### Engine
// - `DYNDNS_QUEUE_CAPACITY`: Dispatch queue capacity (default 10)
// - `DYNDNS_QUEUE_POLICY`: `block` or `reject` on a full queue (default `block`)
// - `DYNDNS_PROVIDER_TIMEOUT`: Per-call provider timeout (default `60s`)
// - `DYNDNS_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
//
// ## Example
//
// ```bash
// export FRITZBOX_ENDPOINT_URL=http://fritz.box:49000
// export FRITZBOX_ENDPOINT_INTERVAL=3m
// export CLOUDFLARE_API_TOKEN=your_token
// export CLOUDFLARE_ZONES_IPV4=home.example.com
// export CLOUDFLARE_ZONES_IPV6=home.example.com
//
// dyndnsd
// ```

mod server;
mod settings;

use anyhow::{Context, Result};
use dyndns_core::config::DyndnsConfig;
use dyndns_core::dispatch;
use dyndns_core::{InterfaceId, PollMetrics, Poller, PushListener, Reconciler, StatusBoard};
use dyndns_gateway_fritzbox::FritzBox;
use dyndns_provider_cloudflare::CloudflareProvider;
use server::{HealthState, PushState};
use settings::Settings;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long servers get to finish in-flight requests on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DyndnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(settings.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    for warning in &settings.warnings {
        warn!("{}", warning);
    }

    if let Err(e) = settings.validate() {
        error!("Configuration validation error: {:#}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    info!("Starting dyndnsd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let daemon = match Daemon::start(settings.config).await {
            Ok(daemon) => daemon,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return DyndnsExitCode::ConfigError;
            }
        };

        if let Err(e) = daemon.run().await {
            error!("Daemon error: {:#}", e);
            DyndnsExitCode::RuntimeError
        } else {
            DyndnsExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Outcome of one server task
type ServerExit = (&'static str, std::io::Result<()>);

/// Running components
struct Daemon {
    /// Reconciler, or the drain standing in for it
    consumer: JoinHandle<()>,
    /// Stops the reconciler after its in-flight address
    consumer_stop: Option<oneshot::Sender<()>>,
    poller: Option<JoinHandle<()>>,
    servers: JoinSet<ServerExit>,
    shutdown: watch::Sender<bool>,
}

impl Daemon {
    /// Build and spawn every configured component
    ///
    /// Fails when a zone cannot be resolved or a listener cannot be bound.
    async fn start(config: DyndnsConfig) -> Result<Self> {
        let interface_id = config
            .local_ipv6
            .as_deref()
            .map(str::parse::<InterfaceId>)
            .transpose()?;

        let (queue, rx) = dispatch::channel(config.engine.queue_capacity, config.engine.queue_policy);
        let mut board = StatusBoard::default();
        let registry = prometheus::Registry::new();

        let (consumer, consumer_stop) = match &config.provider {
            Some(provider) if config.reconciliation_enabled() => {
                let provider = Arc::new(CloudflareProvider::from_config(provider)?);
                let reconciler = Reconciler::initialize(provider, &config.records, &config.engine)
                    .instrument(info_span!("reconciler", subsystem = "cf_updater"))
                    .await?;

                for action in reconciler.actions() {
                    info!(
                        record = %action.record,
                        family = %action.family,
                        "Managing record"
                    );
                }

                board.updates = Some(reconciler.status());
                let (stop, stop_rx) = oneshot::channel();
                let consumer = tokio::spawn(
                    reconciler
                        .run_with_shutdown(rx, stop_rx)
                        .instrument(info_span!("reconciler", subsystem = "cf_updater")),
                );
                (consumer, Some(stop))
            }
            _ => {
                warn!("DNS updates disabled, observed addresses will be discarded");
                (tokio::spawn(rx.discard_all()), None)
            }
        };

        let poller = match &config.poll {
            Some(poll) => {
                let gateway = Arc::new(FritzBox::from_config(poll)?);
                let poller = Poller::new(
                    gateway,
                    &config.records,
                    interface_id,
                    queue.clone(),
                    poll.interval(),
                )
                .with_metrics(PollMetrics::register(&registry)?);
                board.poll = Some(poller.status());

                info!(url = %poll.url, interval = ?poll.interval(), "Polling gateway");
                Some(tokio::spawn(
                    poller
                        .run()
                        .instrument(info_span!("poller", subsystem = "fritzbox_polling")),
                ))
            }
            None => None,
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut servers = JoinSet::new();

        if let Some(push) = &config.push {
            let listener = PushListener::new(queue.clone(), interface_id);
            board.push = Some(listener.status());

            let app = server::push_router(PushState::new(listener, &push.username, &push.password));
            serve(&mut servers, "push_server", &push.bind, app, shutdown_rx.clone()).await?;
        }

        // Only producers may keep the queue open
        drop(queue);

        if let Some(health) = &config.health {
            let app = server::health_router(HealthState::new(board, registry, health.token.as_deref()));
            serve(&mut servers, "metrics", &health.bind, app, shutdown_rx).await?;
        }

        Ok(Self {
            consumer,
            consumer_stop,
            poller,
            servers,
            shutdown,
        })
    }

    /// Run until a shutdown signal arrives or a server fails
    async fn run(mut self) -> Result<()> {
        let outcome = tokio::select! {
            signal = wait_for_shutdown() => {
                info!("Received shutdown signal: {}", signal?);
                Ok(())
            }
            Some(exit) = self.servers.join_next() => Err(match exit {
                Ok((name, Ok(()))) => anyhow::anyhow!("{} stopped unexpectedly", name),
                Ok((name, Err(e))) => anyhow::Error::new(e).context(format!("{} failed", name)),
                Err(e) => anyhow::Error::new(e).context("Server task panicked"),
            }),
        };

        info!("Shutting down daemon");
        self.stop().await;
        outcome
    }

    async fn stop(mut self) {
        // Buffered addresses are dropped, not reconciled
        if let Some(stop) = self.consumer_stop.take() {
            let _ = stop.send(());
        }
        let _ = self.shutdown.send(true);

        if let Some(poller) = &self.poller {
            poller.abort();
        }

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while self.servers.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Servers did not stop within {:?}", SHUTDOWN_GRACE);
            self.servers.abort_all();
        }

        let consumer = self.consumer.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, self.consumer).await.is_err() {
            warn!("In-flight DNS update abandoned after {:?}", SHUTDOWN_GRACE);
            consumer.abort();
        }
    }
}

/// Bind `bind` and serve `app` on `servers` until shutdown is signalled
async fn serve(
    servers: &mut JoinSet<ServerExit>,
    subsystem: &'static str,
    bind: &str,
    app: axum::Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = bind_address(bind)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {} on {}", subsystem, addr))?;

    info!(subsystem, address = %addr, "Listening");

    let shutdown = async move {
        let _ = shutdown.changed().await;
    };

    servers.spawn(
        async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await;
            (subsystem, result)
        }
        .instrument(info_span!("server", subsystem)),
    );

    Ok(())
}

/// Accept `:8080` as shorthand for all interfaces
fn bind_address(bind: &str) -> Result<SocketAddr> {
    let bind = if bind.starts_with(':') {
        format!("0.0.0.0{}", bind)
    } else {
        bind.to_string()
    };

    bind.parse()
        .with_context(|| format!("Invalid listen address '{}'", bind))
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address_shorthand() {
        assert_eq!(bind_address(":8080").unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(
            bind_address("127.0.0.1:9876").unwrap(),
            "127.0.0.1:9876".parse().unwrap()
        );
        assert_eq!(bind_address("[::1]:80").unwrap(), "[::1]:80".parse().unwrap());
        assert!(bind_address("localhost").is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(DyndnsExitCode::CleanShutdown as u8, 0);
        assert_eq!(DyndnsExitCode::ConfigError as u8, 1);
        assert_eq!(DyndnsExitCode::RuntimeError as u8, 2);
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let mut servers = JoinSet::new();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let app = server::health_router(HealthState::new(StatusBoard::default(), prometheus::Registry::new(), None));

        serve(&mut servers, "metrics", "127.0.0.1:0", app, shutdown_rx)
            .await
            .unwrap();
        shutdown.send(true).unwrap();

        let (name, result) = servers.join_next().await.unwrap().unwrap();
        assert_eq!(name, "metrics");
        assert!(result.is_ok());
    }
}
