//! Common error types

use thiserror::Error;

/// Startup and configuration errors shared by the workspace crates.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable {name} is invalid: {reason}")]
    Env { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let config_err = Error::Config("missing calendar_id".into());
        assert_eq!(
            config_err.to_string(),
            "Configuration error: missing calendar_id"
        );

        let env_err = Error::Env {
            name: "PORT".into(),
            reason: "not a number".into(),
        };
        assert_eq!(
            env_err.to_string(),
            "Environment variable PORT is invalid: not a number"
        );

        let io_err = Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(
            io_err.to_string().starts_with("I/O error:"),
            "got: {io_err}"
        );
    }

    #[test]
    fn toml_errors_convert() {
        let parse: std::result::Result<toml::Value, _> = toml::from_str("not valid {{ toml");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Toml(_)));
    }
}
