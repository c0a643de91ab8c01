use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Db(#[from] variant_worker_db::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] variant_worker_storage::Error),

    #[error("Failed to decode image: {0}")]
    Decode(#[from] variant_worker_convert::Error),

    #[error("Failed to encode image: {0}")]
    Encode(#[from] variant_worker_convert::EncodeError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Timed out: {0}")]
    Timeout(&'static str),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Missing configuration value {0}")]
    MissingConfig(&'static str),
}

impl Error {
    /// A short machine-readable category, for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Error::Db(_) => "db",
            Error::Storage(variant_worker_storage::Error::NotFound(_)) => "not_found",
            Error::Storage(_) => "storage",
            Error::Decode(_) => "image_decode",
            Error::Encode(_) => "image_encode",
            Error::Redis(_) => "redis",
            Error::Timeout(_) => "timeout",
            Error::Join(_) => "task",
            Error::MissingConfig(_) => "config",
        }
    }
}
