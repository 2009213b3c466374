use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Empty or non-finite inputs, or a sweep missing a required fixed value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The medium could not evaluate or accept a value. Surfaced verbatim.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// The medium could not be put back to its pre-sweep state.
    /// Treat as an invariant violation.
    #[error("failed to restore medium state (pressure {pressure} bar, temperature {temperature} K): {reason}")]
    StateRestoreFailure {
        pressure: f64,
        temperature: f64,
        reason: String,
    },

    #[error("engine already initialized")]
    AlreadyInitialized,

    #[error("gas file {path:?}: {reason}")]
    GasFile { path: PathBuf, reason: String },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote files {first} and {second} have identical content")]
    DuplicateContent { first: String, second: String },

    #[error("remote files {first} and {second} would both be written as {name}")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn gas_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::GasFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller's request rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
