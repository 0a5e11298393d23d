use std::fmt;

/// Known connection-factory identifiers, as configured through `className`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverClass {
    /// In-process embedded engine.
    Embedded,
    /// In-process embedded engine, pooled connections.
    EmbeddedPool,
    /// Embedded engine reached through its remote-access listener.
    EmbeddedClient,
    PostgresSimple,
    PostgresPooling,
    MySql,
}

/// Registry of `className` values to driver classes.
const DRIVER_REGISTRY: &[(&str, DriverClass)] = &[
    ("embedded", DriverClass::Embedded),
    ("embedded-pool", DriverClass::EmbeddedPool),
    ("embedded-client", DriverClass::EmbeddedClient),
    ("postgres", DriverClass::PostgresSimple),
    ("postgres-pool", DriverClass::PostgresPooling),
    ("mysql", DriverClass::MySql),
];

pub const DEFAULT_CLASS_NAME: &str = "embedded";

impl DriverClass {
    pub fn from_class_name(class_name: &str) -> Option<Self> {
        let wanted = class_name.trim();
        DRIVER_REGISTRY
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, class)| *class)
    }

    pub fn class_name(self) -> &'static str {
        DRIVER_REGISTRY
            .iter()
            .find(|(_, class)| *class == self)
            .map(|(name, _)| *name)
            .unwrap_or(DEFAULT_CLASS_NAME)
    }

    pub fn dialect(self) -> Dialect {
        match self {
            DriverClass::Embedded | DriverClass::EmbeddedPool => Dialect::EmbeddedFile,
            DriverClass::EmbeddedClient => Dialect::EmbeddedFileClientServer,
            DriverClass::PostgresSimple | DriverClass::PostgresPooling => Dialect::PostgreSql,
            DriverClass::MySql => Dialect::MySql,
        }
    }

    /// True for the embedded variants that never go through the network.
    pub fn is_in_process(self) -> bool {
        matches!(self, DriverClass::Embedded | DriverClass::EmbeddedPool)
    }
}

impl fmt::Display for DriverClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    EmbeddedFile,
    EmbeddedFileClientServer,
    PostgreSql,
    MySql,
}

impl Dialect {
    /// `None` for class names outside the registry.
    pub fn from_class_name(class_name: &str) -> Option<Self> {
        DriverClass::from_class_name(class_name).map(DriverClass::dialect)
    }

    pub fn is_embedded(self) -> bool {
        matches!(
            self,
            Dialect::EmbeddedFile | Dialect::EmbeddedFileClientServer
        )
    }

    /// Name of the port property this dialect's connection factory understands.
    pub fn port_key(self) -> &'static str {
        match self {
            Dialect::MySql => "port",
            _ => "portNumber",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Dialect::EmbeddedFile | Dialect::EmbeddedFileClientServer => 1527,
            Dialect::PostgreSql => 5432,
            Dialect::MySql => 3306,
        }
    }

    /// Database that always exists and can be connected to for catalog queries.
    pub fn maintenance_database(self) -> Option<&'static str> {
        match self {
            Dialect::PostgreSql => Some("template1"),
            Dialect::MySql => Some("information_schema"),
            Dialect::EmbeddedFile | Dialect::EmbeddedFileClientServer => None,
        }
    }

    pub fn engine(self) -> &'static str {
        match self {
            Dialect::EmbeddedFile => "embedded",
            Dialect::EmbeddedFileClientServer => "embedded-network",
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
        }
    }
}
