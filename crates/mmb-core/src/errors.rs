/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the farming loop
/// can handle failures consistently (fatal vs retryable).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Session credentials were rejected. Never retried.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http {status} from {url}")]
    Http { status: u16, url: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid proxy {input:?}: {reason}")]
    InvalidProxy { input: String, reason: String },

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Fatal errors end the account loop; everything else is retried after a backoff.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidSession(_))
    }

    /// The API rejected our token; the next iteration must log in again.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Http { status: 401 | 403, .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
