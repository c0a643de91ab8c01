use http::uri::InvalidUri;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidUri(#[from] InvalidUri),

    #[error("Missing field {0}")]
    MissingField(&'static str),

    #[error("Storage backend error: {0}")]
    Backend(eyre::Report),

    #[error("Object {0} not found")]
    NotFound(String),

    #[error(transparent)]
    ObjectStore(object_store::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Error::NotFound(path),
            _ => Error::ObjectStore(err),
        }
    }
}
