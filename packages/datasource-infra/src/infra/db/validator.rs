use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::datasource::DatasourceConfig;
use crate::config::dialect::Dialect;
use crate::config::settings::{BridgeSettings, RetryPolicy};
use crate::error::DbInfraError;
use crate::infra::db::bridge::{
    BridgeError, ConnectivityBridge, GeneratedKeys, ParameterSink, RowSource, SHUTDOWN_SQL_STATE,
};
use crate::infra::db::diagnostics::bootstrap_counters;
use crate::infra::db::factory::{
    bind_applicable_properties, DatasourceFactory, ProvisionedDataSource,
};

pub const POSTGRES_EXISTS_QUERY: &str =
    "select datname from pg_catalog.pg_database where datname = $1";
pub const MYSQL_EXISTS_QUERY: &str = "select schema_name from schemata where schema_name = ?";

fn existence_query(dialect: Dialect) -> Option<&'static str> {
    match dialect {
        Dialect::PostgreSql => Some(POSTGRES_EXISTS_QUERY),
        Dialect::MySql => Some(MYSQL_EXISTS_QUERY),
        Dialect::EmbeddedFile | Dialect::EmbeddedFileClientServer => None,
    }
}

/// Check whether the configured database exists on its server.
///
/// Connects to the dialect's maintenance database and looks the name up in
/// the catalog. The embedded engine has no such check and reports `false`
/// without connecting.
pub async fn database_exists<B: ConnectivityBridge>(
    bridge: &B,
    factory: &DatasourceFactory,
    config: &DatasourceConfig,
    settings: &BridgeSettings,
    cancel: &CancellationToken,
) -> Result<bool, DbInfraError> {
    let database_name = config.database_name().to_string();
    if let Some(dialect) = config.dialect().filter(|d| existence_query(*d).is_none()) {
        debug!(
            database = %database_name,
            dialect = ?dialect,
            "database_exists=unsupported"
        );
        return Ok(false);
    }

    let mut provisioned = maintenance_data_source(factory, config, cancel).await?;
    let dialect = provisioned.data_source().dialect();
    let query = existence_query(dialect);

    let result = check_existence(bridge, &provisioned, query, &database_name, settings).await;

    if let Err(e) = provisioned.shutdown().await {
        debug!(error = %e, "validator listener shutdown failed");
    }

    match result {
        Ok(exists) => {
            info!(
                "database_exists=done database={} dialect={:?} exists={}",
                database_name, dialect, exists
            );
            Ok(exists)
        }
        Err(e) => {
            bootstrap_counters::validation_failed();
            let shown_query = query.unwrap_or("<none>");
            error!(
                database = %database_name,
                query = shown_query,
                error = %e,
                "Failed to check database existence"
            );
            Err(DbInfraError::validation(format!(
                "existence check for database '{database_name}' failed (query: {shown_query}): {e}"
            )))
        }
    }
}

/// Create the configured database when its server does not have it yet.
///
/// Returns `true` only when the database was created by this call. The
/// embedded engine creates its database on connect and always reports
/// `false` here.
pub async fn create_database_if_missing<B: ConnectivityBridge>(
    bridge: &B,
    factory: &DatasourceFactory,
    config: &DatasourceConfig,
    settings: &BridgeSettings,
    cancel: &CancellationToken,
) -> Result<bool, DbInfraError> {
    let database_name = config.database_name().to_string();
    let Some(dialect) = config.dialect() else {
        return Err(DbInfraError::config(format!(
            "Cannot locate datasource class '{}'",
            config.class_name()
        )));
    };
    let Some(sql) = create_database_statement(dialect, &database_name) else {
        debug!(database = %database_name, dialect = ?dialect, "create_database=unsupported");
        return Ok(false);
    };

    if database_exists(bridge, factory, config, settings, cancel).await? {
        debug!(database = %database_name, "create_database=skipped exists");
        return Ok(false);
    }

    let mut provisioned = maintenance_data_source(factory, config, cancel).await?;
    let result = run_create(bridge, &provisioned, &sql, settings).await;

    if let Err(e) = provisioned.shutdown().await {
        debug!(error = %e, "create_database listener shutdown failed");
    }

    match result {
        Ok(()) => {
            info!(
                "create_database=done database={} dialect={:?}",
                database_name, dialect
            );
            Ok(true)
        }
        Err(e) => {
            error!(
                database = %database_name,
                statement = %sql,
                error = %e,
                "Failed to create database"
            );
            Err(DbInfraError::infrastructure(format!(
                "Error creating {} database '{database_name}' if missing: {e}",
                dialect.engine()
            )))
        }
    }
}

fn create_database_statement(dialect: Dialect, database_name: &str) -> Option<String> {
    match dialect {
        Dialect::PostgreSql => Some(format!(
            "create database \"{}\" with template template0",
            database_name.replace('"', "\"\"")
        )),
        Dialect::MySql => Some(format!(
            "create database `{}` character set utf8 collate utf8_general_ci",
            database_name.replace('`', "``")
        )),
        Dialect::EmbeddedFile | Dialect::EmbeddedFileClientServer => None,
    }
}

async fn maintenance_data_source(
    factory: &DatasourceFactory,
    config: &DatasourceConfig,
    cancel: &CancellationToken,
) -> Result<ProvisionedDataSource, DbInfraError> {
    let mut provisioned = factory.build(config, cancel).await?;
    if let Some(maintenance) = provisioned.data_source().dialect().maintenance_database() {
        provisioned.data_source_mut().set_database_name(maintenance);
    }
    Ok(provisioned)
}

async fn run_create<B: ConnectivityBridge>(
    bridge: &B,
    provisioned: &ProvisionedDataSource,
    sql: &str,
    settings: &BridgeSettings,
) -> Result<(), BridgeError> {
    // Server-side database creation is rejected inside a transaction.
    let mut conn = bridge
        .get_connection(provisioned.data_source(), settings.retry, true)
        .await?;

    let result = match bridge
        .prepare_statement(
            &mut conn,
            sql,
            GeneratedKeys::None,
            settings.retry,
            settings.fetch_size,
        )
        .await
    {
        Ok(mut statement) => {
            let updated = bridge.execute_update(&mut statement, settings.retry).await;
            bridge.safe_close_statement(statement);
            updated.map(|_| ())
        }
        Err(e) => Err(e),
    };

    bridge.safe_close_connection(conn);
    result
}

async fn check_existence<B: ConnectivityBridge>(
    bridge: &B,
    provisioned: &ProvisionedDataSource,
    query: Option<&str>,
    database_name: &str,
    settings: &BridgeSettings,
) -> Result<bool, BridgeError> {
    let mut conn = bridge
        .get_connection(provisioned.data_source(), settings.retry, true)
        .await?;

    let result = match query {
        Some(sql) => run_existence_query(bridge, &mut conn, sql, database_name, settings).await,
        None => Ok(false),
    };

    bridge.safe_close_connection(conn);
    result
}

async fn run_existence_query<B: ConnectivityBridge>(
    bridge: &B,
    conn: &mut B::Connection,
    sql: &str,
    database_name: &str,
    settings: &BridgeSettings,
) -> Result<bool, BridgeError> {
    let mut statement = bridge
        .prepare_statement(
            conn,
            sql,
            GeneratedKeys::None,
            settings.retry,
            settings.fetch_size,
        )
        .await?;

    let result = query_returns_row(bridge, &mut statement, database_name, settings.retry).await;

    bridge.safe_close_statement(statement);
    result
}

async fn query_returns_row<B: ConnectivityBridge>(
    bridge: &B,
    statement: &mut B::Statement,
    database_name: &str,
    retry: RetryPolicy,
) -> Result<bool, BridgeError> {
    statement.set_text(1, database_name)?;
    let mut result_set = bridge.execute_query(statement, retry).await?;
    let found = result_set.advance();
    bridge.safe_close_result_set(result_set);
    found
}

/// Ask the in-process embedded engine to shut its database down.
///
/// The engine signals success with SQL state `08006`, so that outcome is
/// expected. Other failures are logged; nothing is returned to the caller.
pub async fn shutdown_embedded_database<B: ConnectivityBridge>(
    bridge: &B,
    config: &DatasourceConfig,
    retry_delay: Duration,
) {
    if config.dialect() != Some(Dialect::EmbeddedFile) {
        debug!(class_name = config.class_name(), "shutdown=skipped not_in_process");
        return;
    }

    let shutdown = config.shutdown_config();
    let mut data_source = match DatasourceFactory::create_data_source(shutdown.class_name()) {
        Ok(data_source) => data_source,
        Err(e) => {
            error!(error = %e, "Failed to create datasource for shutdown");
            return;
        }
    };
    if let Err(e) = bind_applicable_properties(&shutdown, &mut data_source) {
        error!(error = %e, "Failed to bind datasource for shutdown");
        return;
    }

    match bridge
        .get_connection(&data_source, RetryPolicy::new(0, retry_delay), true)
        .await
    {
        Ok(conn) => {
            debug!("shutdown=connected no_shutdown_signal");
            bridge.safe_close_connection(conn);
        }
        Err(e) if e.sql_state() == Some(SHUTDOWN_SQL_STATE) => {
            debug!(database = config.database_name(), "shutdown=done");
        }
        Err(e) => {
            error!(
                database = config.database_name(),
                error = %e,
                "Failed to shut down embedded database"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_statements_quote_the_name() {
        assert_eq!(
            create_database_statement(Dialect::PostgreSql, "we\"ird").as_deref(),
            Some("create database \"we\"\"ird\" with template template0")
        );
        assert_eq!(
            create_database_statement(Dialect::MySql, "inventory").as_deref(),
            Some("create database `inventory` character set utf8 collate utf8_general_ci")
        );
        assert_eq!(create_database_statement(Dialect::EmbeddedFile, "main"), None);
    }

    #[test]
    fn test_existence_queries_per_dialect() {
        assert_eq!(existence_query(Dialect::PostgreSql), Some(POSTGRES_EXISTS_QUERY));
        assert_eq!(existence_query(Dialect::MySql), Some(MYSQL_EXISTS_QUERY));
        assert_eq!(existence_query(Dialect::EmbeddedFile), None);
        assert_eq!(existence_query(Dialect::EmbeddedFileClientServer), None);
    }
}
