//! Typed error hierarchy for taskboard.
//!
//! Two top-level enums cover the two sides of the wire:
//! - `BoardError`: server-side board operations
//! - `ClientError`: the sync client and its transports

use thiserror::Error;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    IllegalArgument,
    TransientStoreFailure,
}

/// Errors from board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board {board_id} not found")]
    BoardNotFound { board_id: String },

    #[error("Column {column_id} not found on board {board_id}")]
    ColumnNotFound { board_id: String, column_id: String },

    #[error("Card {task_id} not found on board {board_id}")]
    CardNotFound { board_id: String, task_id: String },

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Store failure: {0}")]
    TransientStoreFailure(#[source] anyhow::Error),
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BoardNotFound { .. } | Self::ColumnNotFound { .. } | Self::CardNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::IllegalArgument(_) => ErrorKind::IllegalArgument,
            Self::TransientStoreFailure(_) => ErrorKind::TransientStoreFailure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn card_not_found(board_id: &str, task_id: &str) -> Self {
        Self::CardNotFound {
            board_id: board_id.to_string(),
            task_id: task_id.to_string(),
        }
    }

    pub(crate) fn column_not_found(board_id: &str, column_id: &str) -> Self {
        Self::ColumnNotFound {
            board_id: board_id.to_string(),
            column_id: column_id.to_string(),
        }
    }
}

/// Errors from the sync client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),

    #[error(transparent)]
    Board(#[from] BoardError),

    #[error("Card {0} is not on the local board")]
    UnknownCard(String),

    #[error("Column {0} is not on the local board")]
    UnknownColumn(String),
}

impl ClientError {
    /// True when the server answered with "not found", either over HTTP or
    /// through the in-process transport.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rejected { status, .. } => *status == 404,
            Self::Board(e) => e.is_not_found(),
            _ => false,
        }
    }
}
