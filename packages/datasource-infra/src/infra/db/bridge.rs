//! Contract of the retrying connectivity layer the datasource code runs on.
//!
//! Implementations own their retry internals; callers only hand over a
//! [`RetryPolicy`] per operation.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::settings::RetryPolicy;
use crate::infra::db::factory::DataSource;
use crate::model::column::SqlType;

/// SQL state the embedded engine reports for a successful shutdown.
pub const SHUTDOWN_SQL_STATE: &str = "08006";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("SQL error: {message}")]
    Sql {
        sql_state: Option<String>,
        message: String,
    },
    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },
}

impl BridgeError {
    pub fn sql(message: impl Into<String>) -> Self {
        Self::Sql {
            sql_state: None,
            message: message.into(),
        }
    }

    pub fn with_state(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sql {
            sql_state: Some(sql_state.into()),
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    pub fn sql_state(&self) -> Option<&str> {
        match self {
            BridgeError::Sql { sql_state, .. } => sql_state.as_deref(),
            BridgeError::Unsupported { .. } => None,
        }
    }
}

impl From<sea_orm::DbErr> for BridgeError {
    fn from(e: sea_orm::DbErr) -> Self {
        BridgeError::sql(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKeys {
    None,
    Return,
}

/// Positional, typed parameter binding on a prepared statement. Indexes start at 1.
pub trait ParameterSink {
    fn set_i64(&mut self, index: usize, value: i64) -> Result<(), BridgeError>;
    fn set_bool(&mut self, index: usize, value: bool) -> Result<(), BridgeError>;
    fn set_i32(&mut self, index: usize, value: i32) -> Result<(), BridgeError>;
    fn set_i16(&mut self, index: usize, value: i16) -> Result<(), BridgeError>;
    fn set_text(&mut self, index: usize, value: &str) -> Result<(), BridgeError>;
    fn set_null(&mut self, index: usize, sql_type: SqlType) -> Result<(), BridgeError>;
}

/// Cursor over query results, read by column name.
pub trait RowSource {
    /// Move to the next row; `false` once the rows are exhausted.
    fn advance(&mut self) -> Result<bool, BridgeError>;
    fn get_i64(&self, column: &str) -> Result<Option<i64>, BridgeError>;
    fn get_bool(&self, column: &str) -> Result<Option<bool>, BridgeError>;
    fn get_i32(&self, column: &str) -> Result<Option<i32>, BridgeError>;
    fn get_i16(&self, column: &str) -> Result<Option<i16>, BridgeError>;
    fn get_text(&self, column: &str) -> Result<Option<String>, BridgeError>;
}

#[async_trait]
pub trait ConnectivityBridge: Send + Sync {
    type Connection: Send;
    type Statement: ParameterSink + Send;
    type ResultSet: RowSource + Send;

    async fn get_connection(
        &self,
        data_source: &DataSource,
        retry: RetryPolicy,
        auto_commit: bool,
    ) -> Result<Self::Connection, BridgeError>;

    async fn prepare_statement(
        &self,
        conn: &mut Self::Connection,
        sql: &str,
        generated_keys: GeneratedKeys,
        retry: RetryPolicy,
        fetch_size: u32,
    ) -> Result<Self::Statement, BridgeError>;

    async fn execute_query(
        &self,
        statement: &mut Self::Statement,
        retry: RetryPolicy,
    ) -> Result<Self::ResultSet, BridgeError>;

    /// Rows affected.
    async fn execute_update(
        &self,
        statement: &mut Self::Statement,
        retry: RetryPolicy,
    ) -> Result<u64, BridgeError>;

    fn safe_close_result_set(&self, result_set: Self::ResultSet);
    fn safe_close_statement(&self, statement: Self::Statement);
    fn safe_close_connection(&self, conn: Self::Connection);
}
