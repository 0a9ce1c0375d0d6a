//! Error types for the tree layer

use gumbo_html::{DecodeError, EngineError};

/// Tree access error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Cannot access a disposed object: {object}")]
    Disposed { object: &'static str },

    #[error("Lazy {object} value is unavailable: its production panicked")]
    Poisoned { object: &'static str },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Root record is not a document")]
    UnexpectedRoot,
}

pub type Result<T> = std::result::Result<T, Error>;
