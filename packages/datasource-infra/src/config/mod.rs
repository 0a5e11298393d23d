//! Configuration sources and the engine-specific datasource configuration.

pub mod datasource;
pub mod dialect;
pub mod settings;
pub mod tree;

pub use datasource::{transform_datasource_config, DatasourceConfig};
pub use dialect::{Dialect, DriverClass};
pub use settings::{BridgeSettings, RetryPolicy};
pub use tree::ConfigTree;
