use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the auth, metadata and API layers.
///
/// Command handlers wrap these in `anyhow` with extra context; the process
/// boundary only ever prints the message chain.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{message}: {source}")]
    Persistence {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("timed out after {0:?} waiting for the authorization redirect")]
    Timeout(std::time::Duration),

    #[error("authorization cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no changes specified. Use --title, --description, --tags, or --privacy")]
    NoChangesSpecified,

    #[error("video does not meet Shorts requirements: {0}")]
    Validation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl Error {
    pub fn persistence(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Persistence {
            message: message.into(),
            source: source.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}
