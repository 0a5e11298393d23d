//! Connectivity bridge over sea-orm connection pools.
//!
//! Covers PostgreSQL, MySQL and the in-process embedded engine (SQLite). The
//! embedded network client has no sea-orm driver and is rejected.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult,
    Statement, Value,
};
use tracing::{debug, info, trace, warn};

use crate::config::dialect::Dialect;
use crate::config::settings::RetryPolicy;
use crate::infra::db::bridge::{
    BridgeError, ConnectivityBridge, GeneratedKeys, ParameterSink, RowSource, SHUTDOWN_SQL_STATE,
};
use crate::infra::db::diagnostics::{bootstrap_counters, sanitize_db_url};
use crate::infra::db::factory::DataSource;
use crate::model::column::SqlType;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

async fn retry_operation<T, F, Fut>(
    operation: &str,
    mut attempt_fn: F,
    retry: RetryPolicy,
) -> Result<T, BridgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BridgeError>>,
{
    let max_attempts = retry.max_attempts();
    let interval_ms = retry.retry_delay.as_millis();
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match attempt_fn().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        "bridge_retry=success op={} attempts={} interval_ms={}",
                        operation, attempt, interval_ms
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                if attempt < max_attempts {
                    bootstrap_counters::connection_retry();
                    warn!(
                        "bridge_retry=failed op={} attempt={} max_attempts={} interval_ms={} error={}",
                        operation, attempt, max_attempts, interval_ms, e
                    );
                    tokio::time::sleep(retry.retry_delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        BridgeError::sql(format!("{operation}: no attempts were made"))
    }))
}

// sea-orm panics when asked for the last insert id of a PostgreSQL result.
fn reports_last_insert_id(backend: DatabaseBackend) -> bool {
    !matches!(backend, DatabaseBackend::Postgres)
}

fn backend_for(dialect: Dialect) -> Result<DatabaseBackend, BridgeError> {
    match dialect {
        Dialect::EmbeddedFile => Ok(DatabaseBackend::Sqlite),
        Dialect::PostgreSql => Ok(DatabaseBackend::Postgres),
        Dialect::MySql => Ok(DatabaseBackend::MySql),
        Dialect::EmbeddedFileClientServer => Err(BridgeError::unsupported(
            "no sea-orm driver for the embedded network client",
        )),
    }
}

/// sea-orm backed [`ConnectivityBridge`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SeaBridge;

impl SeaBridge {
    pub fn new() -> Self {
        Self
    }
}

pub struct SeaConnection {
    db: DatabaseConnection,
}

impl SeaConnection {
    pub fn backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    pub fn inner(&self) -> &DatabaseConnection {
        &self.db
    }
}

pub struct SeaStatement {
    db: DatabaseConnection,
    sql: String,
    params: Vec<Option<Value>>,
    generated_keys: GeneratedKeys,
    fetch_size: u32,
    generated_key: Option<u64>,
}

impl SeaStatement {
    /// Key generated by the last update run with [`GeneratedKeys::Return`].
    ///
    /// Always `None` on PostgreSQL, whose driver reports keys only through a
    /// `returning` clause read with `execute_query`.
    pub fn generated_key(&self) -> Option<u64> {
        self.generated_key
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<(), BridgeError> {
        if index == 0 {
            return Err(BridgeError::sql("parameter indexes start at 1"));
        }
        if self.params.len() < index {
            self.params.resize(index, None);
        }
        self.params[index - 1] = Some(value);
        Ok(())
    }

    fn to_statement(&self) -> Result<Statement, BridgeError> {
        let values = self
            .params
            .iter()
            .enumerate()
            .map(|(i, value)| {
                value
                    .clone()
                    .ok_or_else(|| BridgeError::sql(format!("parameter {} is not bound", i + 1)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Statement::from_sql_and_values(
            self.db.get_database_backend(),
            self.sql.as_str(),
            values,
        ))
    }
}

impl ParameterSink for SeaStatement {
    fn set_i64(&mut self, index: usize, value: i64) -> Result<(), BridgeError> {
        self.bind(index, value.into())
    }

    fn set_bool(&mut self, index: usize, value: bool) -> Result<(), BridgeError> {
        self.bind(index, value.into())
    }

    fn set_i32(&mut self, index: usize, value: i32) -> Result<(), BridgeError> {
        self.bind(index, value.into())
    }

    fn set_i16(&mut self, index: usize, value: i16) -> Result<(), BridgeError> {
        self.bind(index, value.into())
    }

    fn set_text(&mut self, index: usize, value: &str) -> Result<(), BridgeError> {
        self.bind(index, value.into())
    }

    fn set_null(&mut self, index: usize, sql_type: SqlType) -> Result<(), BridgeError> {
        let null = match sql_type {
            SqlType::BigInt => Value::BigInt(None),
            SqlType::Boolean => Value::Bool(None),
            SqlType::Integer => Value::Int(None),
            SqlType::SmallInt => Value::SmallInt(None),
            SqlType::VarChar => Value::String(None),
            SqlType::Double => Value::Double(None),
            SqlType::Timestamp => Value::TimeDateTime(None),
        };
        self.bind(index, null)
    }
}

/// Buffered query results with a current-row cursor.
pub struct SeaResultSet {
    rows: VecDeque<QueryResult>,
    current: Option<QueryResult>,
}

impl SeaResultSet {
    fn current(&self) -> Result<&QueryResult, BridgeError> {
        self.current
            .as_ref()
            .ok_or_else(|| BridgeError::sql("result set is not positioned on a row"))
    }

    fn get<T: sea_orm::TryGetable>(&self, column: &str) -> Result<Option<T>, BridgeError> {
        Ok(self.current()?.try_get::<Option<T>>("", column)?)
    }
}

impl RowSource for SeaResultSet {
    fn advance(&mut self) -> Result<bool, BridgeError> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn get_i64(&self, column: &str) -> Result<Option<i64>, BridgeError> {
        self.get(column)
    }

    fn get_bool(&self, column: &str) -> Result<Option<bool>, BridgeError> {
        self.get(column)
    }

    fn get_i32(&self, column: &str) -> Result<Option<i32>, BridgeError> {
        self.get(column)
    }

    fn get_i16(&self, column: &str) -> Result<Option<i16>, BridgeError> {
        self.get(column)
    }

    fn get_text(&self, column: &str) -> Result<Option<String>, BridgeError> {
        self.get(column)
    }
}

#[async_trait]
impl ConnectivityBridge for SeaBridge {
    type Connection = SeaConnection;
    type Statement = SeaStatement;
    type ResultSet = SeaResultSet;

    async fn get_connection(
        &self,
        data_source: &DataSource,
        retry: RetryPolicy,
        auto_commit: bool,
    ) -> Result<SeaConnection, BridgeError> {
        if !auto_commit {
            return Err(BridgeError::unsupported(
                "pooled connections run in auto-commit mode; use an explicit transaction",
            ));
        }
        backend_for(data_source.dialect())?;

        let url = data_source.connection_url()?;
        let mut opt = ConnectOptions::new(url.clone());
        opt.min_connections(data_source.initial_connections().unwrap_or(1))
            .max_connections(data_source.max_connections().unwrap_or(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .sqlx_logging(false);

        let db = retry_operation(
            "get_connection",
            || {
                let opt = opt.clone();
                async move { Database::connect(opt).await.map_err(BridgeError::from) }
            },
            retry,
        )
        .await?;

        debug!(url = %sanitize_db_url(&url), "bridge=connected");

        if data_source.dialect() == Dialect::EmbeddedFile
            && data_source.shutdown_database() == Some("shutdown")
        {
            db.close().await?;
            return Err(BridgeError::with_state(
                SHUTDOWN_SQL_STATE,
                format!(
                    "Database '{}' shutdown.",
                    data_source.database_name().unwrap_or_default()
                ),
            ));
        }

        Ok(SeaConnection { db })
    }

    async fn prepare_statement(
        &self,
        conn: &mut SeaConnection,
        sql: &str,
        generated_keys: GeneratedKeys,
        _retry: RetryPolicy,
        fetch_size: u32,
    ) -> Result<SeaStatement, BridgeError> {
        trace!(sql = sql, generated_keys = ?generated_keys, fetch_size = fetch_size, "bridge=prepared");
        Ok(SeaStatement {
            db: conn.db.clone(),
            sql: sql.to_string(),
            params: Vec::new(),
            generated_keys,
            fetch_size,
            generated_key: None,
        })
    }

    async fn execute_query(
        &self,
        statement: &mut SeaStatement,
        retry: RetryPolicy,
    ) -> Result<SeaResultSet, BridgeError> {
        let stmt = statement.to_statement()?;
        let db = statement.db.clone();

        let rows = retry_operation(
            "execute_query",
            || {
                let db = db.clone();
                let stmt = stmt.clone();
                async move { db.query_all(stmt).await.map_err(BridgeError::from) }
            },
            retry,
        )
        .await?;

        trace!(rows = rows.len(), fetch_size = statement.fetch_size, "bridge=query_done");
        Ok(SeaResultSet {
            rows: rows.into(),
            current: None,
        })
    }

    async fn execute_update(
        &self,
        statement: &mut SeaStatement,
        retry: RetryPolicy,
    ) -> Result<u64, BridgeError> {
        let stmt = statement.to_statement()?;
        let db = statement.db.clone();

        let result = retry_operation(
            "execute_update",
            || {
                let db = db.clone();
                let stmt = stmt.clone();
                async move { db.execute(stmt).await.map_err(BridgeError::from) }
            },
            retry,
        )
        .await?;

        statement.generated_key = None;
        if statement.generated_keys == GeneratedKeys::Return
            && reports_last_insert_id(db.get_database_backend())
        {
            let key = result.last_insert_id();
            trace!(last_insert_id = key, "bridge=update_done");
            statement.generated_key = Some(key);
        }
        Ok(result.rows_affected())
    }

    fn safe_close_result_set(&self, _result_set: SeaResultSet) {}

    fn safe_close_statement(&self, _statement: SeaStatement) {}

    fn safe_close_connection(&self, conn: SeaConnection) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.db.close().await {
                        debug!(error = %e, "bridge=close_failed");
                    }
                });
            }
            Err(_) => drop(conn),
        }
    }
}
