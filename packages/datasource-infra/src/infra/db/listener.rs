use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::DbInfraError;
use crate::infra::db::diagnostics::bootstrap_counters;

pub const LISTENER_PROBE_ATTEMPTS: u32 = 40;
pub const LISTENER_PROBE_INTERVAL_MS: u64 = 500;

/// Handle on the embedded engine's network server.
#[async_trait]
pub trait ServerControl: Send + Sync {
    async fn start(&self) -> Result<(), DbInfraError>;

    /// Lightweight liveness probe.
    async fn ping(&self) -> Result<(), DbInfraError>;

    async fn shutdown(&self) -> Result<(), DbInfraError>;
}

pub trait ServerControlFactory: Send + Sync {
    fn create(&self, address: SocketAddr) -> Result<Box<dyn ServerControl>, DbInfraError>;
}

/// Control for a network server launched outside this process.
///
/// `start` and `shutdown` leave the server alone; `ping` opens and drops a
/// TCP connection to the listening address.
#[derive(Debug, Clone, Copy)]
pub struct TcpPingControl {
    address: SocketAddr,
    connect_timeout: Duration,
}

impl TcpPingControl {
    pub fn new(address: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            address,
            connect_timeout,
        }
    }
}

#[async_trait]
impl ServerControl for TcpPingControl {
    async fn start(&self) -> Result<(), DbInfraError> {
        debug!(address = %self.address, "listener=external start_skipped");
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbInfraError> {
        match tokio::time::timeout(
            self.connect_timeout,
            tokio::net::TcpStream::connect(self.address),
        )
        .await
        {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(DbInfraError::infrastructure(format!(
                "listener at {} refused the connection: {e}",
                self.address
            ))),
            Err(_) => Err(DbInfraError::infrastructure(format!(
                "listener at {} did not answer within {:?}",
                self.address, self.connect_timeout
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), DbInfraError> {
        debug!(address = %self.address, "listener=external shutdown_skipped");
        Ok(())
    }
}

/// Hands out a [`TcpPingControl`] for every requested address.
#[derive(Debug, Clone, Copy)]
pub struct TcpPingFactory {
    pub connect_timeout: Duration,
}

impl Default for TcpPingFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(LISTENER_PROBE_INTERVAL_MS),
        }
    }
}

impl ServerControlFactory for TcpPingFactory {
    fn create(&self, address: SocketAddr) -> Result<Box<dyn ServerControl>, DbInfraError> {
        Ok(Box::new(TcpPingControl::new(address, self.connect_timeout)))
    }
}

/// Fixed readiness schedule for listener bring-up. Independent of the
/// connectivity bridge's retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerSchedule {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ListenerSchedule {
    fn default() -> Self {
        Self {
            attempts: LISTENER_PROBE_ATTEMPTS,
            interval: Duration::from_millis(LISTENER_PROBE_INTERVAL_MS),
        }
    }
}

/// A started, reachable remote-access listener.
pub struct RemoteAccessListener {
    address: SocketAddr,
    attempts: u32,
    control: Box<dyn ServerControl>,
}

impl RemoteAccessListener {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Probes it took to observe the listener as ready.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub async fn shutdown(self) -> Result<(), DbInfraError> {
        self.control.shutdown().await.map_err(|e| {
            DbInfraError::infrastructure(format!(
                "failed to stop remote access listener on {}: {}",
                self.address, e
            ))
        })?;
        info!("listener=stopped address={}", self.address);
        Ok(())
    }
}

impl fmt::Debug for RemoteAccessListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAccessListener")
            .field("address", &self.address)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}

/// Start the embedded engine's network server on `server_name:port` and wait
/// until it answers a probe.
pub async fn start_remote_access_listener(
    controls: &dyn ServerControlFactory,
    server_name: &str,
    port: u16,
    schedule: ListenerSchedule,
    cancel: &CancellationToken,
) -> Result<RemoteAccessListener, DbInfraError> {
    let address = resolve(server_name, port).await?;

    let control = controls.create(address).map_err(|e| {
        DbInfraError::infrastructure(format!(
            "failed to create network server control for {address}: {e}"
        ))
    })?;
    control.start().await.map_err(|e| {
        DbInfraError::infrastructure(format!("failed to start network server on {address}: {e}"))
    })?;
    debug!("listener=started address={}", address);

    let interval_ms = schedule.interval.as_millis();
    for attempt in 1..=schedule.attempts {
        bootstrap_counters::listener_probe();

        match control.ping().await {
            Ok(()) => {
                bootstrap_counters::listener_ready();
                info!(
                    "listener=ready address={} attempts={} interval_ms={}",
                    address, attempt, interval_ms
                );
                return Ok(RemoteAccessListener {
                    address,
                    attempts: attempt,
                    control,
                });
            }
            Err(e) => {
                trace!(listener = "probe_failed", attempt = attempt, error = %e);
            }
        }

        if attempt < schedule.attempts {
            tokio::select! {
                _ = tokio::time::sleep(schedule.interval) => {}
                _ = cancel.cancelled() => {
                    info!(attempts = attempt, "Listener readiness wait cancelled");
                    break;
                }
            }
        }
    }

    bootstrap_counters::listener_exhausted();
    warn!(
        "listener=exhausted address={} max_attempts={} interval_ms={}",
        address, schedule.attempts, interval_ms
    );
    if let Err(e) = control.shutdown().await {
        debug!(error = %e, "network server shutdown after failed bring-up");
    }

    Err(DbInfraError::infrastructure(
        "Cannot enable remote access to the embedded database",
    ))
}

async fn resolve(server_name: &str, port: u16) -> Result<SocketAddr, DbInfraError> {
    let unknown_host =
        |detail: String| DbInfraError::config(format!("unknown host '{server_name}': {detail}"));

    let mut addresses = tokio::net::lookup_host((server_name, port))
        .await
        .map_err(|e| unknown_host(e.to_string()))?;

    addresses
        .next()
        .ok_or_else(|| unknown_host("no addresses returned".to_string()))
}
