use std::fmt;

use tracing::{debug, trace};

use crate::config::dialect::{Dialect, DriverClass, DEFAULT_CLASS_NAME};
use crate::config::tree::ConfigTree;
use crate::error::DbInfraError;

pub const DEFAULT_SERVER_NAME: &str = "localhost";

/// Engine-specific connection-factory configuration.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DatasourceConfig {
    props: ConfigTree,
}

impl DatasourceConfig {
    pub fn new(props: ConfigTree) -> Self {
        Self { props }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key)
    }

    /// Value of `key`, treating an empty string like an absent key.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.props.contains_key(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.props.put(key, value);
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.props.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.props.iter()
    }

    pub fn class_name(&self) -> &str {
        self.get("className").unwrap_or(DEFAULT_CLASS_NAME)
    }

    pub fn driver_class(&self) -> Option<DriverClass> {
        DriverClass::from_class_name(self.class_name())
    }

    pub fn dialect(&self) -> Option<Dialect> {
        self.driver_class().map(DriverClass::dialect)
    }

    pub fn user(&self) -> &str {
        self.get("user").unwrap_or_default()
    }

    pub fn password(&self) -> &str {
        self.get("password").unwrap_or_default()
    }

    pub fn database_name(&self) -> &str {
        self.get("databaseName").unwrap_or_default()
    }

    pub fn server_name(&self) -> &str {
        self.get("serverName").unwrap_or(DEFAULT_SERVER_NAME)
    }

    /// Variant of this configuration that shuts the embedded engine down
    /// when a connection is requested through it.
    pub fn shutdown_config(&self) -> DatasourceConfig {
        let mut shutdown = self.clone();
        shutdown.remove("createDatabase");
        shutdown.put("shutdownDatabase", "shutdown");
        shutdown
    }
}

impl fmt::Debug for DatasourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in self.props.iter() {
            if key == "password" {
                map.entry(&key, &"***");
            } else {
                map.entry(&key, &value);
            }
        }
        map.finish()
    }
}

/// Convert the datasource subtree of the host configuration into the
/// configuration the connection factory of its dialect expects.
pub fn transform_datasource_config(
    host: &ConfigTree,
    root: &str,
) -> Result<DatasourceConfig, DbInfraError> {
    let mut ds = DatasourceConfig::new(host.subtree(root));

    if ds.non_empty("className").is_none() {
        ds.put("className", DEFAULT_CLASS_NAME);
    }
    let class_name = ds.class_name().to_string();
    let dialect = ds.dialect();
    trace!(class_name = %class_name, dialect = ?dialect, "datasource_config=classified");

    if let Some(dialect) = dialect {
        if dialect.is_embedded() && ds.remove("createDatabase").is_some() {
            trace!("datasource_config=filtered key=createDatabase");
        }

        normalize_port(&mut ds, dialect);

        if ds.non_empty("serverName").is_none() {
            ds.put("serverName", DEFAULT_SERVER_NAME);
        }
    }

    if ds.non_empty("databaseName").is_none() {
        match dialect {
            Some(d) if d.is_embedded() => {
                return Err(DbInfraError::config(format!(
                    "databaseName is required for datasource class '{class_name}': \
                     the embedded database location cannot be reconstructed post hoc"
                )));
            }
            Some(Dialect::PostgreSql) | Some(Dialect::MySql) => {
                let user = ds.user().to_string();
                if user.trim().is_empty() {
                    ds.remove("databaseName");
                } else {
                    trace!(database_name = %user, "datasource_config=defaulted key=databaseName");
                    ds.put("databaseName", user);
                }
            }
            _ => {
                ds.remove("databaseName");
            }
        }
    }

    debug!(config = ?ds, "datasource_config=ready");
    Ok(ds)
}

/// Leave exactly one port key, named the way the dialect expects.
fn normalize_port(ds: &mut DatasourceConfig, dialect: Dialect) {
    match dialect {
        Dialect::MySql => {
            if let Some(port) = ds.remove("portNumber") {
                ds.put("port", port);
            }
        }
        _ => {
            if let Some(port) = ds.remove("port") {
                if !ds.contains_key("portNumber") {
                    ds.put("portNumber", port);
                }
            }
        }
    }

    let key = dialect.port_key();
    if ds.non_empty(key).is_none() {
        ds.put(key, dialect.default_port().to_string());
    }
}
