//! Schema-version transitions that wait for the host to finish starting.

pub mod queue;
pub mod readiness;
pub mod statements;
pub mod task;

pub use queue::MigrationQueue;
pub use readiness::{HostReadiness, ReadinessGate};
pub use statements::StatementMigrator;
pub use task::{MigrationState, MigrationTask, SchemaMigrator};
