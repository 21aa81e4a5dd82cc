use thiserror::Error;

/// Errors raised while assembling the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),
}
