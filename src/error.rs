use thiserror::Error;

/// Every failure the client can surface.
///
/// Data-flow operations only ever produce `NotAuthenticated`, `Validation`
/// or `Store`; `Config` is raised at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No signed-in session when a task call was attempted.
    #[error("User not authenticated")]
    NotAuthenticated,

    /// Input rejected locally, before anything was sent.
    #[error("{0}")]
    Validation(String),

    /// Transport, decode or server-side rejection from the backing service.
    #[error("{0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Error::Store(message.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Store(format!("Malformed response: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
