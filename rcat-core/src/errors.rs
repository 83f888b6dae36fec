use thiserror::Error;

/// Error type for invalid operations.
///
/// Configuration and graph integrity problems are raised while loading or
/// validating a configuration, before any realization is run.
/// State and consistency problems are raised while a realization is running
/// and abort that run only.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RCATError {
    #[error("{0}")]
    Error(String),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Processor '{processor}' has child intakes summing to {total}%, expected 100%")]
    InvalidIntakeSum { processor: String, total: f64 },
    #[error("Unknown production line '{0}'")]
    UnknownProductionLine(String),
    #[error("Invalid lifetime {value}: lifetimes must be finite and non-negative")]
    InvalidLifetime { value: f64 },
    #[error("Endless loop detected in processor graph involving: {}", nodes.join(", "))]
    GraphIntegrity { nodes: Vec<String> },
    #[error("Invalid state: {0}")]
    State(String),
    #[error("Consistency check failed: {0}")]
    Consistency(String),
    #[error("Invalid time table: {0}")]
    TimeTable(String),
    #[error("Simulation cancelled after {completed} realization(s)")]
    Cancelled { completed: usize },
    #[error("Could not read configuration: {0}")]
    Serialization(String),
}

impl RCATError {
    /// True for the errors that are detected while loading or validating a
    /// configuration, before any realization runs.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            RCATError::Configuration(_)
                | RCATError::InvalidIntakeSum { .. }
                | RCATError::UnknownProductionLine(_)
                | RCATError::InvalidLifetime { .. }
                | RCATError::GraphIntegrity { .. }
                | RCATError::Serialization(_)
        )
    }
}

impl From<toml::de::Error> for RCATError {
    fn from(value: toml::de::Error) -> Self {
        RCATError::Serialization(value.to_string())
    }
}

/// Convenience type for `Result<T, RCATError>`.
pub type RCATResult<T> = Result<T, RCATError>;
