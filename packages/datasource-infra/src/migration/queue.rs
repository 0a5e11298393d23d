use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infra::db::diagnostics::bootstrap_counters;
use crate::migration::readiness::HostReadiness;
use crate::migration::task::{MigrationState, MigrationTask, SchemaMigrator};

/// Runs schema transitions one after another, oldest first, in a single
/// background task.
#[derive(Debug, Clone)]
pub struct MigrationQueue {
    tasks: Vec<MigrationTask>,
    pending: Arc<Mutex<Vec<MigrationTask>>>,
}

impl MigrationQueue {
    pub fn new(tasks: impl IntoIterator<Item = MigrationTask>) -> Self {
        let mut tasks: Vec<MigrationTask> = tasks.into_iter().collect();
        tasks.sort();
        tasks.dedup();

        Self {
            pending: Arc::new(Mutex::new(tasks.clone())),
            tasks,
        }
    }

    pub fn tasks(&self) -> &[MigrationTask] {
        &self.tasks
    }

    /// Transitions that have not reached a final state, e.g. `"13 -> 14"`.
    pub fn pending(&self) -> Vec<String> {
        self.pending.lock().iter().map(ToString::to_string).collect()
    }

    /// After a transition fails or is abandoned, the rest are marked
    /// [`MigrationState::Skipped`].
    pub fn start(
        &self,
        host: Arc<dyn HostReadiness>,
        migrator: Arc<dyn SchemaMigrator>,
        cancel: CancellationToken,
    ) -> JoinHandle<Vec<(MigrationTask, MigrationState)>> {
        let tasks = self.tasks.clone();
        let pending = Arc::clone(&self.pending);

        tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(tasks.len());
            let mut halted = false;

            for task in tasks {
                let state = if halted {
                    MigrationState::Skipped
                } else {
                    task.run(host.as_ref(), migrator.as_ref(), &cancel).await
                };

                if state != MigrationState::Succeeded && !halted {
                    halted = true;
                    warn!(migration = %task, state = ?state, "migration queue halted");
                }

                pending.lock().retain(|t| *t != task);
                outcomes.push((task, state));
            }

            let skipped = outcomes
                .iter()
                .filter(|(_, s)| *s == MigrationState::Skipped)
                .count();
            bootstrap_counters::add_migration_skipped(skipped);
            info!(
                "migration_queue=done total={} skipped={}",
                outcomes.len(),
                skipped
            );
            bootstrap_counters::log_snapshot("migration_queue");
            outcomes
        })
    }
}
