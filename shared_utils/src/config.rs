use thiserror::Error;

/// Errors related to application configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable required by the application is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable is set but its value could not be parsed.
    #[error("Invalid value {value:?} for environment variable {name}: {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Raw value as read from the environment.
        value: String,
        /// Parser message.
        message: String,
    },

    /// A configuration value is out of its allowed range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
