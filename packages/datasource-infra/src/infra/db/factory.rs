use std::fmt;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::datasource::{DatasourceConfig, DEFAULT_SERVER_NAME};
use crate::config::dialect::{Dialect, DriverClass};
use crate::error::DbInfraError;
use crate::infra::db::bridge::BridgeError;
use crate::infra::db::listener::{
    start_remote_access_listener, ListenerSchedule, RemoteAccessListener, ServerControlFactory,
};

/// An engine-specific object that can produce connections once its
/// properties are bound.
pub trait ConnectionFactory {
    fn driver_class(&self) -> DriverClass;

    /// Bind one named property. Only called for names applicable to the
    /// factory's dialect.
    fn set_property(&mut self, name: &str, value: &str) -> Result<(), String>;
}

type Setter = fn(&mut DataSource, &str) -> Result<(), String>;

const UNIVERSAL_SETTERS: &[(&str, Setter)] = &[
    ("serverName", set_server_name),
    ("dataSourceName", set_data_source_name),
    ("databaseName", set_database_name),
    ("user", set_user),
    ("description", set_description),
];

const EMBEDDED_SETTERS: &[(&str, Setter)] = &[
    ("createDatabase", set_create_database),
    ("shutdownDatabase", set_shutdown_database),
    ("portNumber", set_port),
    ("password", set_password),
];

const POSTGRES_SETTERS: &[(&str, Setter)] = &[
    ("initialConnections", set_initial_connections),
    ("maxConnections", set_max_connections),
    ("portNumber", set_port),
    ("password", set_password),
];

const MYSQL_SETTERS: &[(&str, Setter)] = &[("port", set_port)];

fn set_server_name(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.server_name = Some(value.to_string());
    Ok(())
}

fn set_data_source_name(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.data_source_name = Some(value.to_string());
    Ok(())
}

fn set_database_name(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.database_name = Some(value.to_string());
    Ok(())
}

fn set_user(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.user = Some(value.to_string());
    Ok(())
}

fn set_description(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.description = Some(value.to_string());
    Ok(())
}

fn set_create_database(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.create_database = Some(value.to_string());
    Ok(())
}

fn set_shutdown_database(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.shutdown_database = Some(value.to_string());
    Ok(())
}

fn set_initial_connections(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.initial_connections = Some(parse_count(value)?);
    Ok(())
}

fn set_max_connections(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.max_connections = Some(parse_count(value)?);
    Ok(())
}

fn set_port(ds: &mut DataSource, value: &str) -> Result<(), String> {
    let port = value
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("invalid port number: {e}"))?;
    ds.port_number = Some(port);
    Ok(())
}

fn set_password(ds: &mut DataSource, value: &str) -> Result<(), String> {
    ds.password = Some(value.to_string());
    Ok(())
}

fn parse_count(value: &str) -> Result<u32, String> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("invalid connection count: {e}"))
}

fn dialect_setters(dialect: Dialect) -> &'static [(&'static str, Setter)] {
    match dialect {
        Dialect::EmbeddedFile | Dialect::EmbeddedFileClientServer => EMBEDDED_SETTERS,
        Dialect::PostgreSql => POSTGRES_SETTERS,
        Dialect::MySql => MYSQL_SETTERS,
    }
}

fn find_setter(dialect: Dialect, name: &str) -> Option<Setter> {
    UNIVERSAL_SETTERS
        .iter()
        .chain(dialect_setters(dialect))
        .find(|(property, _)| *property == name)
        .map(|(_, setter)| *setter)
}

/// Whether `name` is a property the connection factory of `dialect` accepts.
pub fn is_applicable_property(dialect: Dialect, name: &str) -> bool {
    find_setter(dialect, name).is_some()
}

/// Bind every applicable configuration key onto `target`; other keys are
/// ignored. Returns the number of properties bound.
pub fn bind_applicable_properties(
    config: &DatasourceConfig,
    target: &mut dyn ConnectionFactory,
) -> Result<usize, DbInfraError> {
    let driver = target.driver_class();
    let dialect = driver.dialect();
    let mut bound = 0;

    for (key, value) in config.iter() {
        if !is_applicable_property(dialect, key) {
            trace!(property = key, dialect = ?dialect, "datasource_bind=skipped");
            continue;
        }

        target.set_property(key, value).map_err(|e| {
            let shown = if key == "password" { "***" } else { value };
            DbInfraError::config(format!(
                "Cannot set value '{shown}' for property '{key}' for instance of datasource class '{driver}': {e}"
            ))
        })?;
        trace!(property = key, "datasource_bind=set");
        bound += 1;
    }

    Ok(bound)
}

/// Connection-factory object for one of the supported engines.
#[derive(Clone, PartialEq, Eq)]
pub struct DataSource {
    driver: DriverClass,
    server_name: Option<String>,
    data_source_name: Option<String>,
    database_name: Option<String>,
    user: Option<String>,
    password: Option<String>,
    description: Option<String>,
    port_number: Option<u16>,
    create_database: Option<String>,
    shutdown_database: Option<String>,
    initial_connections: Option<u32>,
    max_connections: Option<u32>,
}

impl DataSource {
    pub fn new(driver: DriverClass) -> Self {
        Self {
            driver,
            server_name: None,
            data_source_name: None,
            database_name: None,
            user: None,
            password: None,
            description: None,
            port_number: None,
            create_database: None,
            shutdown_database: None,
            initial_connections: None,
            max_connections: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn server_name(&self) -> &str {
        self.server_name.as_deref().unwrap_or(DEFAULT_SERVER_NAME)
    }

    pub fn port(&self) -> u16 {
        self.port_number
            .unwrap_or_else(|| self.dialect().default_port())
    }

    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }

    pub fn set_database_name(&mut self, name: impl Into<String>) {
        self.database_name = Some(name.into());
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn data_source_name(&self) -> Option<&str> {
        self.data_source_name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn create_database(&self) -> Option<&str> {
        self.create_database.as_deref()
    }

    pub fn shutdown_database(&self) -> Option<&str> {
        self.shutdown_database.as_deref()
    }

    pub fn initial_connections(&self) -> Option<u32> {
        self.initial_connections
    }

    pub fn max_connections(&self) -> Option<u32> {
        self.max_connections
    }

    /// Engine URL for drivers addressed by connection string.
    pub fn connection_url(&self) -> Result<String, BridgeError> {
        let encode = |s: &str| utf8_percent_encode(s, NON_ALPHANUMERIC).to_string();
        let database = self.database_name.as_deref().unwrap_or_default();

        match self.driver {
            DriverClass::Embedded | DriverClass::EmbeddedPool => {
                let mode = if self.create_database.as_deref() == Some("create") {
                    "rwc"
                } else {
                    "rw"
                };
                Ok(format!("sqlite://{database}?mode={mode}"))
            }
            DriverClass::EmbeddedClient => Err(BridgeError::unsupported(
                "the embedded network client is reached through its own listener, not a URL",
            )),
            DriverClass::PostgresSimple | DriverClass::PostgresPooling | DriverClass::MySql => {
                let scheme = if self.driver == DriverClass::MySql {
                    "mysql"
                } else {
                    "postgres"
                };
                let user = encode(self.user.as_deref().unwrap_or_default());
                let auth = match self.password.as_deref() {
                    Some(password) if !password.is_empty() => {
                        format!("{user}:{}", encode(password))
                    }
                    _ => user,
                };
                Ok(format!(
                    "{scheme}://{auth}@{}:{}/{}",
                    self.server_name(),
                    self.port(),
                    encode(database)
                ))
            }
        }
    }
}

impl ConnectionFactory for DataSource {
    fn driver_class(&self) -> DriverClass {
        self.driver
    }

    fn set_property(&mut self, name: &str, value: &str) -> Result<(), String> {
        let setter = find_setter(self.dialect(), name).ok_or_else(|| {
            format!("'{name}' is not a property of datasource class '{}'", self.driver)
        })?;
        setter(self, value)
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("driver", &self.driver)
            .field("server_name", &self.server_name)
            .field("database_name", &self.database_name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("port_number", &self.port_number)
            .field("create_database", &self.create_database)
            .field("shutdown_database", &self.shutdown_database)
            .finish_non_exhaustive()
    }
}

/// A bound data source plus the remote-access listener started for it, if any.
#[derive(Debug)]
pub struct ProvisionedDataSource {
    data_source: DataSource,
    listener: Option<RemoteAccessListener>,
}

impl ProvisionedDataSource {
    pub fn data_source(&self) -> &DataSource {
        &self.data_source
    }

    pub fn data_source_mut(&mut self) -> &mut DataSource {
        &mut self.data_source
    }

    pub fn listener(&self) -> Option<&RemoteAccessListener> {
        self.listener.as_ref()
    }

    pub fn into_data_source(self) -> (DataSource, Option<RemoteAccessListener>) {
        (self.data_source, self.listener)
    }

    /// Stop the remote-access listener, if one was started.
    pub async fn shutdown(self) -> Result<(), DbInfraError> {
        if let Some(listener) = self.listener {
            listener.shutdown().await?;
        }
        Ok(())
    }
}

/// Builds property-bound data sources and brings up the embedded engine's
/// listener when the configuration asks for network access.
#[derive(Clone)]
pub struct DatasourceFactory {
    server_controls: Arc<dyn ServerControlFactory>,
    schedule: ListenerSchedule,
}

impl DatasourceFactory {
    pub fn new(server_controls: Arc<dyn ServerControlFactory>) -> Self {
        Self {
            server_controls,
            schedule: ListenerSchedule::default(),
        }
    }

    pub fn with_schedule(mut self, schedule: ListenerSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Locate the connection-factory type named by `class_name`.
    pub fn create_data_source(class_name: &str) -> Result<DataSource, DbInfraError> {
        let driver = DriverClass::from_class_name(class_name).ok_or_else(|| {
            DbInfraError::config(format!("Cannot locate datasource class '{class_name}'"))
        })?;
        debug!(driver = %driver, "datasource=created");
        Ok(DataSource::new(driver))
    }

    pub async fn build(
        &self,
        config: &DatasourceConfig,
        cancel: &CancellationToken,
    ) -> Result<ProvisionedDataSource, DbInfraError> {
        let mut data_source = Self::create_data_source(config.class_name())?;
        let driver = data_source.driver_class();

        check_authentication(config, driver)?;

        let bound = bind_applicable_properties(config, &mut data_source)?;
        debug!(driver = %driver, bound = bound, "datasource=bound");

        let listener = if driver.dialect() == Dialect::EmbeddedFileClientServer {
            let listener = start_remote_access_listener(
                self.server_controls.as_ref(),
                data_source.server_name(),
                data_source.port(),
                self.schedule,
                cancel,
            )
            .await?;
            Some(listener)
        } else {
            None
        };

        info!(
            "datasource=ready driver={} engine={} listener={}",
            driver,
            driver.dialect().engine(),
            listener.is_some()
        );

        Ok(ProvisionedDataSource {
            data_source,
            listener,
        })
    }
}

/// A network-reachable embedded engine would reject connections without a
/// password, so refuse to build one.
fn check_authentication(
    config: &DatasourceConfig,
    driver: DriverClass,
) -> Result<(), DbInfraError> {
    let missing_user = config.user().trim().is_empty();
    let missing_password = driver.dialect().is_embedded()
        && !driver.is_in_process()
        && config.password().is_empty();

    if missing_user || missing_password {
        return Err(DbInfraError::config("Missing required authentication"));
    }
    Ok(())
}
