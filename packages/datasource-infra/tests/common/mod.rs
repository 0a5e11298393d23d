#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use datasource_infra::config::settings::RetryPolicy;
use datasource_infra::config::{ConfigTree, DatasourceConfig, DriverClass};
use datasource_infra::infra::db::{
    BridgeError, ConnectionFactory, ConnectivityBridge, DataSource, GeneratedKeys, ParameterSink,
    RowSource, ServerControl, ServerControlFactory,
};
use datasource_infra::model::SqlType;
use datasource_infra::DbInfraError;
use parking_lot::Mutex;

pub fn init_logging() {
    datasource_test_support::logging::init();
}

pub fn host_config(root: &str, pairs: &[(&str, &str)]) -> ConfigTree {
    ConfigTree::from_pairs(
        pairs
            .iter()
            .map(|(k, v)| (format!("{root}.{k}"), v.to_string())),
    )
}

pub fn datasource_config(pairs: &[(&str, &str)]) -> DatasourceConfig {
    DatasourceConfig::new(ConfigTree::from_pairs(pairs.iter().copied()))
}

/// Connection factory that records every property bound to it.
pub struct RecordingFactory {
    pub driver: DriverClass,
    pub bound: Vec<(String, String)>,
}

impl RecordingFactory {
    pub fn new(driver: DriverClass) -> Self {
        Self {
            driver,
            bound: Vec::new(),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.bound.iter().map(|(k, _)| k.as_str()).collect()
    }
}

impl ConnectionFactory for RecordingFactory {
    fn driver_class(&self) -> DriverClass {
        self.driver
    }

    fn set_property(&mut self, name: &str, value: &str) -> Result<(), String> {
        self.bound.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// Server control whose probe succeeds from the `succeed_on`-th call.
#[derive(Clone, Default)]
pub struct ScriptedServer {
    pub succeed_on: Option<u32>,
    pub fail_start: bool,
    pub pings: Arc<AtomicU32>,
    pub started: Arc<AtomicBool>,
    pub stopped: Arc<AtomicBool>,
    pub created_for: Arc<Mutex<Vec<SocketAddr>>>,
}

impl ScriptedServer {
    pub fn succeeding_on(attempt: u32) -> Self {
        Self {
            succeed_on: Some(attempt),
            ..Self::default()
        }
    }

    pub fn never_ready() -> Self {
        Self::default()
    }

    pub fn ping_count(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerControl for ScriptedServer {
    async fn start(&self) -> Result<(), DbInfraError> {
        if self.fail_start {
            return Err(DbInfraError::infrastructure("address already in use"));
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), DbInfraError> {
        let n = self.pings.fetch_add(1, Ordering::SeqCst) + 1;
        match self.succeed_on {
            Some(target) if n >= target => Ok(()),
            _ => Err(DbInfraError::infrastructure("connection refused")),
        }
    }

    async fn shutdown(&self) -> Result<(), DbInfraError> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl ServerControlFactory for ScriptedServer {
    fn create(&self, address: SocketAddr) -> Result<Box<dyn ServerControl>, DbInfraError> {
        self.created_for.lock().push(address);
        Ok(Box::new(self.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    I64(usize, i64),
    Bool(usize, bool),
    I32(usize, i32),
    I16(usize, i16),
    Text(usize, String),
    Null(usize, SqlType),
}

/// Statement that records every bind call in order.
#[derive(Debug, Default)]
pub struct FakeStatement {
    pub sql: String,
    pub binds: Vec<Bind>,
}

impl ParameterSink for FakeStatement {
    fn set_i64(&mut self, index: usize, value: i64) -> Result<(), BridgeError> {
        self.binds.push(Bind::I64(index, value));
        Ok(())
    }

    fn set_bool(&mut self, index: usize, value: bool) -> Result<(), BridgeError> {
        self.binds.push(Bind::Bool(index, value));
        Ok(())
    }

    fn set_i32(&mut self, index: usize, value: i32) -> Result<(), BridgeError> {
        self.binds.push(Bind::I32(index, value));
        Ok(())
    }

    fn set_i16(&mut self, index: usize, value: i16) -> Result<(), BridgeError> {
        self.binds.push(Bind::I16(index, value));
        Ok(())
    }

    fn set_text(&mut self, index: usize, value: &str) -> Result<(), BridgeError> {
        self.binds.push(Bind::Text(index, value.to_string()));
        Ok(())
    }

    fn set_null(&mut self, index: usize, sql_type: SqlType) -> Result<(), BridgeError> {
        self.binds.push(Bind::Null(index, sql_type));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FakeValue {
    I64(i64),
    Bool(bool),
    I32(i32),
    I16(i16),
    Text(String),
    Null,
}

/// A single row addressed by column name. Counts getter calls.
#[derive(Debug, Default)]
pub struct FakeRow {
    pub values: HashMap<String, FakeValue>,
    pub reads: AtomicU32,
}

impl FakeRow {
    pub fn with(mut self, column: &str, value: FakeValue) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn read_count(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    fn lookup(&self, column: &str) -> Result<&FakeValue, BridgeError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.values
            .get(column)
            .ok_or_else(|| BridgeError::sql(format!("no column '{column}'")))
    }
}

macro_rules! typed_getter {
    ($name:ident, $ty:ty, $variant:ident) => {
        fn $name(&self, column: &str) -> Result<Option<$ty>, BridgeError> {
            match self.lookup(column)? {
                FakeValue::$variant(v) => Ok(Some(v.clone())),
                FakeValue::Null => Ok(None),
                other => Err(BridgeError::sql(format!(
                    "column '{column}' holds {other:?}"
                ))),
            }
        }
    };
}

impl RowSource for FakeRow {
    fn advance(&mut self) -> Result<bool, BridgeError> {
        Ok(true)
    }

    typed_getter!(get_i64, i64, I64);
    typed_getter!(get_bool, bool, Bool);
    typed_getter!(get_i32, i32, I32);
    typed_getter!(get_i16, i16, I16);
    typed_getter!(get_text, String, Text);
}

/// Result set over a fixed number of rows; only cursor movement matters.
pub struct FakeResultSet {
    pub remaining: usize,
}

impl RowSource for FakeResultSet {
    fn advance(&mut self) -> Result<bool, BridgeError> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        Ok(true)
    }

    fn get_i64(&self, _column: &str) -> Result<Option<i64>, BridgeError> {
        Ok(None)
    }

    fn get_bool(&self, _column: &str) -> Result<Option<bool>, BridgeError> {
        Ok(None)
    }

    fn get_i32(&self, _column: &str) -> Result<Option<i32>, BridgeError> {
        Ok(None)
    }

    fn get_i16(&self, _column: &str) -> Result<Option<i16>, BridgeError> {
        Ok(None)
    }

    fn get_text(&self, _column: &str) -> Result<Option<String>, BridgeError> {
        Ok(None)
    }
}

pub struct FakeConnection {
    pub database: String,
}

/// Bridge that records the calls made on it as short event strings.
#[derive(Default)]
pub struct FakeBridge {
    pub rows: usize,
    pub connect_error: Option<BridgeError>,
    pub fail_query: bool,
    pub fail_update: bool,
    pub events: Mutex<Vec<String>>,
    pub binds: Mutex<Vec<Bind>>,
}

impl FakeBridge {
    pub fn returning_rows(rows: usize) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }
}

#[async_trait]
impl ConnectivityBridge for FakeBridge {
    type Connection = FakeConnection;
    type Statement = FakeStatement;
    type ResultSet = FakeResultSet;

    async fn get_connection(
        &self,
        data_source: &DataSource,
        _retry: RetryPolicy,
        auto_commit: bool,
    ) -> Result<FakeConnection, BridgeError> {
        let database = data_source.database_name().unwrap_or_default().to_string();
        self.record(format!("connect {database} auto_commit={auto_commit}"));

        if let Some(e) = &self.connect_error {
            return Err(match e.sql_state() {
                Some(state) => BridgeError::with_state(state, e.to_string()),
                None => BridgeError::sql(e.to_string()),
            });
        }
        Ok(FakeConnection { database })
    }

    async fn prepare_statement(
        &self,
        _conn: &mut FakeConnection,
        sql: &str,
        _generated_keys: GeneratedKeys,
        _retry: RetryPolicy,
        _fetch_size: u32,
    ) -> Result<FakeStatement, BridgeError> {
        self.record(format!("prepare {sql}"));
        Ok(FakeStatement {
            sql: sql.to_string(),
            binds: Vec::new(),
        })
    }

    async fn execute_query(
        &self,
        statement: &mut FakeStatement,
        _retry: RetryPolicy,
    ) -> Result<FakeResultSet, BridgeError> {
        self.binds.lock().extend(statement.binds.iter().cloned());
        self.record("query");
        if self.fail_query {
            return Err(BridgeError::sql("relation does not exist"));
        }
        Ok(FakeResultSet {
            remaining: self.rows,
        })
    }

    async fn execute_update(
        &self,
        statement: &mut FakeStatement,
        _retry: RetryPolicy,
    ) -> Result<u64, BridgeError> {
        self.record(format!("update {}", statement.sql));
        if self.fail_query || self.fail_update {
            return Err(BridgeError::sql("syntax error"));
        }
        Ok(1)
    }

    fn safe_close_result_set(&self, _result_set: FakeResultSet) {
        self.record("close result_set");
    }

    fn safe_close_statement(&self, _statement: FakeStatement) {
        self.record("close statement");
    }

    fn safe_close_connection(&self, _conn: FakeConnection) {
        self.record("close connection");
    }
}

/// Readiness handle whose state the test flips by hand.
#[derive(Default)]
pub struct ManualReadiness {
    pub started: AtomicBool,
    pub notify: tokio::sync::Notify,
}

impl ManualReadiness {
    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl datasource_infra::migration::HostReadiness for ManualReadiness {
    fn units_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    async fn wait_until_units_started(&self) {
        let notified = self.notify.notified();
        if self.units_started() {
            return;
        }
        notified.await;
    }
}

/// Migrator that records calls and the host state it observed at each.
pub struct RecordingMigrator {
    pub host: Arc<ManualReadiness>,
    pub fail_on: Option<(u32, u32)>,
    pub calls: Mutex<Vec<(u32, u32, bool)>>,
}

impl RecordingMigrator {
    pub fn new(host: Arc<ManualReadiness>) -> Self {
        Self {
            host,
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u32, u32, bool)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl datasource_infra::migration::SchemaMigrator for RecordingMigrator {
    async fn migrate_from(&self, from_version: u32, to_version: u32) -> Result<(), DbInfraError> {
        use datasource_infra::migration::HostReadiness;

        let ready = self.host.units_started();
        self.calls.lock().push((from_version, to_version, ready));
        if self.fail_on == Some((from_version, to_version)) {
            return Err(DbInfraError::migration("column already exists"));
        }
        Ok(())
    }
}
