use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing configuration: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid index schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid orderby: {0}")]
    InvalidOrderBy(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP-style status the service would answer with for this failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::IndexNotFound(_) | Error::DocumentNotFound(_) => Some(404),
            Error::IndexAlreadyExists(_) => Some(409),
            Error::InvalidSchema(_) | Error::InvalidFilter(_) | Error::InvalidOrderBy(_) | Error::InvalidRequest(_) => Some(400),
            Error::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::IndexNotFound(_) | Error::DocumentNotFound(_))
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self { Error::Config(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
