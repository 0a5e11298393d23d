pub mod bridge;
pub mod diagnostics;
pub mod factory;
pub mod listener;
pub mod sea_bridge;
pub mod validator;

pub use bridge::{
    BridgeError, ConnectivityBridge, GeneratedKeys, ParameterSink, RowSource, SHUTDOWN_SQL_STATE,
};
pub use diagnostics::{bootstrap_counters, sanitize_db_url};
pub use factory::{
    bind_applicable_properties, is_applicable_property, ConnectionFactory, DataSource,
    DatasourceFactory, ProvisionedDataSource,
};
pub use listener::{
    start_remote_access_listener, ListenerSchedule, RemoteAccessListener, ServerControl,
    ServerControlFactory, TcpPingControl, TcpPingFactory,
};
pub use sea_bridge::SeaBridge;
pub use validator::{create_database_if_missing, database_exists, shutdown_embedded_database};
