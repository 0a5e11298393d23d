use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::settings::BridgeSettings;
use crate::error::DbInfraError;
use crate::infra::db::bridge::{BridgeError, ConnectivityBridge, GeneratedKeys};
use crate::infra::db::factory::DataSource;
use crate::migration::task::SchemaMigrator;

/// [`SchemaMigrator`] that runs registered SQL statements for each
/// transition over a connectivity bridge.
pub struct StatementMigrator<B: ConnectivityBridge> {
    bridge: Arc<B>,
    data_source: DataSource,
    settings: BridgeSettings,
    steps: BTreeMap<(u32, u32), Vec<String>>,
}

impl<B: ConnectivityBridge> StatementMigrator<B> {
    pub fn new(bridge: Arc<B>, data_source: DataSource, settings: BridgeSettings) -> Self {
        Self {
            bridge,
            data_source,
            settings,
            steps: BTreeMap::new(),
        }
    }

    pub fn register<S: Into<String>>(
        mut self,
        from_version: u32,
        to_version: u32,
        statements: impl IntoIterator<Item = S>,
    ) -> Self {
        self.steps.insert(
            (from_version, to_version),
            statements.into_iter().map(Into::into).collect(),
        );
        self
    }

    async fn execute_all(
        &self,
        conn: &mut B::Connection,
        statements: &[String],
    ) -> Result<u64, BridgeError> {
        let mut affected = 0;
        for sql in statements {
            let mut statement = self
                .bridge
                .prepare_statement(
                    conn,
                    sql,
                    GeneratedKeys::None,
                    self.settings.retry,
                    self.settings.fetch_size,
                )
                .await?;
            let result = self
                .bridge
                .execute_update(&mut statement, self.settings.retry)
                .await;
            self.bridge.safe_close_statement(statement);
            affected += result?;
        }
        Ok(affected)
    }
}

#[async_trait]
impl<B: ConnectivityBridge> SchemaMigrator for StatementMigrator<B> {
    async fn migrate_from(&self, from_version: u32, to_version: u32) -> Result<(), DbInfraError> {
        let statements = self.steps.get(&(from_version, to_version)).ok_or_else(|| {
            DbInfraError::migration(format!(
                "no migration registered for {from_version} -> {to_version}"
            ))
        })?;

        let mut conn = self
            .bridge
            .get_connection(&self.data_source, self.settings.retry, true)
            .await?;
        let result = self.execute_all(&mut conn, statements).await;
        self.bridge.safe_close_connection(conn);

        let affected = result.map_err(|e| {
            DbInfraError::migration(format!(
                "migration {from_version} -> {to_version} failed: {e}"
            ))
        })?;
        debug!(
            from = from_version,
            to = to_version,
            statements = statements.len(),
            rows_affected = affected,
            "statement migration applied"
        );
        Ok(())
    }
}
