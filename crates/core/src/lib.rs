//! Chess Anywhere core library
//!
//! Game state travels in the URL as a token; every move is persisted as a
//! node of a branching move tree that is rebuilt on read.

pub mod codec;
pub mod error;
pub mod id;
pub mod parser;
pub mod rules;
pub mod samples;
pub mod session;
pub mod storage;
pub mod tree;

pub use codec::GameState;
pub use error::{Error, Result};
pub use id::{GameId, Id, IdSource, MoveId, RandomIds};
pub use rules::{Classification, MoveDescriptor, Rules, StandardRules};
pub use session::{Clock, GameSession, SessionState, Snapshot, StagedMove, SystemClock};
pub use storage::{Database, GameDocument, GameStore, MemoryStore, MoveRecord, Outcome};
pub use tree::{build_tree, GameStats, MoveTreeNode, SiteStats};
