//! Parser module for reading chess game formats
//!
//! Currently supports:
//! - PGN (Portable Game Notation), main line only

pub mod pgn;

pub use pgn::{parse_pgn_file, parse_pgn_string, PgnGame, Ply};
