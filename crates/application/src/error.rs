use export_host_domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("index {index} out of range for {count} items")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("io error: {0}")]
    Io(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("plugin error: {0}")]
    Plugin(String),
    #[error("export state error: {0}")]
    State(String),
    #[error("export cancelled")]
    Cancelled,
}

impl ApplicationError {
    pub fn lock_poisoned(what: &str) -> Self {
        Self::Io(format!("{what} lock poisoned"))
    }
}
