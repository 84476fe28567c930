//! Error types for chess-anywhere-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed game token: {0}")]
    MalformedToken(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("Move tree has no root record")]
    MissingRoot,

    #[error("Move tree has {count} root records")]
    MultipleRoots { count: usize },

    #[error("Move {move_id} references missing parent {parent_id}")]
    DanglingParent { move_id: String, parent_id: String },

    #[error("Ancestry of move {0} loops back on itself")]
    CyclicAncestry(String),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Move {move_id} not found in game {game_id}")]
    MoveNotFound { game_id: String, move_id: String },

    #[error("Move {move_id} already recorded in game {game_id}")]
    DuplicateMove { game_id: String, move_id: String },

    #[error("No game loaded")]
    NotLoaded,

    #[error("A move is already awaiting confirmation")]
    MovePending,

    #[error("No move is awaiting confirmation")]
    NothingStaged,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("PGN parsing error: {0}")]
    Pgn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures of the persistence collaborator.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Storage(_)
                | Error::GameNotFound(_)
                | Error::MoveNotFound { .. }
                | Error::DuplicateMove { .. }
        )
    }

    /// True for errors that mean a token could not be turned back into a game state.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::MalformedToken(_) | Error::InvalidPosition(_))
    }

    /// True for move-tree integrity violations.
    pub fn is_corrupt_tree(&self) -> bool {
        matches!(
            self,
            Error::MissingRoot
                | Error::MultipleRoots { .. }
                | Error::DanglingParent { .. }
                | Error::CyclicAncestry(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
