//! Datasource bootstrap: configuration transformation, connection-factory
//! binding, embedded listener bring-up, existence checks and readiness-gated
//! schema migrations.

pub mod auth;
pub mod config;
pub mod error;
pub mod infra;
pub mod migration;
pub mod model;

pub use auth::RemoteAuthenticator;
pub use config::{transform_datasource_config, BridgeSettings, ConfigTree, DatasourceConfig};
pub use error::DbInfraError;
pub use infra::db::{
    create_database_if_missing, database_exists, shutdown_embedded_database, DatasourceFactory,
    SeaBridge,
};
