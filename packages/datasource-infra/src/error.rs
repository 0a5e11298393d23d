use thiserror::Error;

use crate::infra::db::bridge::BridgeError;

#[derive(Debug, Error)]
pub enum DbInfraError {
    #[error("Configuration error: {message}")]
    Config { message: String },
    #[error("Infrastructure error: {message}")]
    Infrastructure { message: String },
    #[error("Validation error: {message}")]
    Validation { message: String },
    #[error("Migration error: {message}")]
    Migration { message: String },
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl DbInfraError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Stable code for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            DbInfraError::Config { .. } => "CONFIG_ERROR",
            DbInfraError::Infrastructure { .. } => "INFRA_ERROR",
            DbInfraError::Validation { .. } => "VALIDATION_ERROR",
            DbInfraError::Migration { .. } => "MIGRATION_ERROR",
            DbInfraError::Bridge(_) => "BRIDGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_category() {
        let err = DbInfraError::config("Missing required authentication");
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required authentication"
        );
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_bridge_error_is_transparent() {
        let err: DbInfraError = BridgeError::sql("connection refused").into();
        assert_eq!(err.to_string(), "SQL error: connection refused");
        assert_eq!(err.code(), "BRIDGE_ERROR");
    }
}
