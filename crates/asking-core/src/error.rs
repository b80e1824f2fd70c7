//! Error types for card validation and store access.

use crate::CardId;
use thiserror::Error;

/// Why a create request was turned away.
///
/// These never reach anyone but the client that sent the request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Topic is required")]
    EmptyTopic,

    #[error("Topic must be at least {min} characters")]
    TopicTooShort { min: usize },

    #[error("File name is required")]
    EmptyFileName,

    #[error("File size {size} bytes exceeds the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },
}

impl ValidationError {
    /// The request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyTopic | Self::TopicTooShort { .. } => "topic",
            Self::EmptyFileName | Self::FileTooLarge { .. } => "file",
        }
    }
}

/// Errors from [`crate::CardStore`] lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Card not found: {0}")]
    NotFound(CardId),
}
