use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::DbInfraError;
use crate::infra::db::diagnostics::bootstrap_counters;
use crate::migration::readiness::HostReadiness;

/// Applies one schema-version transition.
#[async_trait]
pub trait SchemaMigrator: Send + Sync {
    async fn migrate_from(&self, from_version: u32, to_version: u32) -> Result<(), DbInfraError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    WaitingForHostReady,
    Running,
    Succeeded,
    Failed,
    /// Cancelled before the host became ready.
    Abandoned,
    /// Not attempted because an earlier transition did not succeed.
    Skipped,
}

impl MigrationState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            MigrationState::WaitingForHostReady | MigrationState::Running
        )
    }
}

/// One `from -> to` schema transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationTask {
    from_version: u32,
    to_version: u32,
}

impl MigrationTask {
    pub fn new(from_version: u32, to_version: u32) -> Self {
        Self {
            from_version,
            to_version,
        }
    }

    pub fn from_version(&self) -> u32 {
        self.from_version
    }

    pub fn to_version(&self) -> u32 {
        self.to_version
    }

    /// Wait for the host, then run the transition exactly once.
    ///
    /// Failures are logged and reported through the returned state, never
    /// raised.
    pub async fn run(
        &self,
        host: &dyn HostReadiness,
        migrator: &dyn SchemaMigrator,
        cancel: &CancellationToken,
    ) -> MigrationState {
        debug!(migration = %self, state = ?MigrationState::WaitingForHostReady);

        while !host.units_started() {
            tokio::select! {
                _ = host.wait_until_units_started() => {}
                _ = cancel.cancelled() => {
                    if host.units_started() {
                        break;
                    }
                    bootstrap_counters::migration_abandoned();
                    info!("migration=abandoned from={} to={}", self.from_version, self.to_version);
                    return MigrationState::Abandoned;
                }
            }
        }

        debug!(migration = %self, state = ?MigrationState::Running);
        info!("migration=start from={} to={}", self.from_version, self.to_version);

        match migrator
            .migrate_from(self.from_version, self.to_version)
            .await
        {
            Ok(()) => {
                bootstrap_counters::migration_succeeded();
                info!("migration=done from={} to={}", self.from_version, self.to_version);
                MigrationState::Succeeded
            }
            Err(e) => {
                bootstrap_counters::migration_failed();
                error!(
                    from = self.from_version,
                    to = self.to_version,
                    error = %e,
                    "Schema migration failed"
                );
                MigrationState::Failed
            }
        }
    }

    /// Run as an independent background task.
    pub fn spawn(
        self,
        host: Arc<dyn HostReadiness>,
        migrator: Arc<dyn SchemaMigrator>,
        cancel: CancellationToken,
    ) -> JoinHandle<MigrationState> {
        tokio::spawn(async move { self.run(host.as_ref(), migrator.as_ref(), &cancel).await })
    }
}

impl fmt::Display for MigrationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from_version, self.to_version)
    }
}
