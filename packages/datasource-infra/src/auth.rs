//! Credential check for connections arriving at the embedded engine's
//! network listener.

use tracing::{debug, warn};

use crate::config::datasource::DatasourceConfig;
use crate::config::dialect::DriverClass;
use crate::model::credentials::DbCredentials;

/// Single credential pair captured from the active datasource configuration.
#[derive(Debug, Clone)]
pub struct RemoteAuthenticator {
    credentials: DbCredentials,
    database_name: String,
}

impl RemoteAuthenticator {
    pub fn new(config: &DatasourceConfig) -> Self {
        Self {
            credentials: DbCredentials::new(
                config.user(),
                config.password(),
                config.class_name(),
            ),
            database_name: config.database_name().to_string(),
        }
    }

    pub fn credentials(&self) -> &DbCredentials {
        &self.credentials
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    fn is_in_process(&self) -> bool {
        DriverClass::from_class_name(self.credentials.class_name())
            .is_some_and(DriverClass::is_in_process)
    }

    /// The database name is accepted for the listener's calling convention
    /// but not compared.
    pub fn authenticate(&self, user: &str, password: &str, database: &str) -> bool {
        if self.is_in_process() {
            return true;
        }

        if user.is_empty() || password.is_empty() {
            debug!(database = database, "remote_auth=rejected reason=empty_credentials");
            return false;
        }

        let accepted = self.credentials.matches(user, password);
        if !accepted {
            warn!(user = user, database = database, "remote_auth=rejected reason=mismatch");
        }
        accepted
    }
}
