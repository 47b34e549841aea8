//! Core error types

use thiserror::Error;

/// Errors raised by core types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),

    #[error("Turn {index} is not sealed")]
    UnsealedTurn { index: u32 },

    #[error("Turn {index} is out of order (last logged turn is {last})")]
    OutOfOrder { index: u32, last: u32 },

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),
}

pub type Result<T> = std::result::Result<T, Error>;
