/// Configuration mistakes detected while resolving options or declaring columns.
///
/// These indicate a programming error in the caller, not transient state, so
/// they are never retried and always abort the current declare/render call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("column `{column}`: format `{format}` is not supported")]
    UnsupportedFormat { column: String, format: String },
    #[error("column `{id}` was requested but has not been declared")]
    ColumnNotDeclared { id: String },
    #[error("invalid column id `{id}`: {reason}")]
    InvalidColumnId { id: String, reason: &'static str },
    #[error("option `{key}`: {message}")]
    InvalidOption { key: String, message: String },
    #[error("option `{key}` requires {dependency}")]
    MissingDependency { key: String, dependency: String },
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::InvalidOption`] on `key`.
    pub fn invalid_option(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced by table operations.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("table `{table}` has no preference store attached")]
    StateUnavailable { table: String },
    #[error("record provider error: {0}")]
    Provider(#[from] anyhow::Error),
}

impl GridError {
    /// Whether this error stems from caller configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, GridError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_offending_key() {
        let err = ConfigError::UnsupportedFormat {
            column: "amount".to_string(),
            format: "money".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "column `amount`: format `money` is not supported"
        );

        let err = ConfigError::invalid_option("reload", "expected a boolean");
        assert_eq!(err.to_string(), "option `reload`: expected a boolean");
    }

    #[test]
    fn grid_error_wraps_config_transparently() {
        let err: GridError = ConfigError::ColumnNotDeclared {
            id: "ssn".to_string(),
        }
        .into();
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "column `ssn` was requested but has not been declared"
        );

        let err = GridError::StateUnavailable {
            table: "users".to_string(),
        };
        assert!(!err.is_configuration());
    }
}
