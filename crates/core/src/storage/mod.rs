//! Game persistence
//!
//! One document per game holds every move record ever made in it. Records
//! are only ever appended; the single in-place edit is marking a record
//! terminal.

mod db;
mod memory;
mod models;

pub use db::Database;
pub use memory::MemoryStore;
pub use models::*;

use async_trait::async_trait;

use crate::error::Result;
use crate::id::{GameId, MoveId};

/// The persistence collaborator used by sessions and the web layer.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// The full document for `game_id`, or `None` if no such game exists.
    async fn get(&self, game_id: &GameId) -> Result<Option<GameDocument>>;

    /// Stores a brand new game. The document must hold exactly its root record.
    async fn create_game(&self, game: &GameDocument) -> Result<()>;

    /// Adds one record under an existing game.
    ///
    /// Fails with `GameNotFound` if the game does not exist, with
    /// `DuplicateMove` if the id is already taken, and with `MoveNotFound`
    /// if the record's parent is not in the game. A record without a parent
    /// is rejected, since every game already has its root. Existing records
    /// are never touched.
    async fn append_move(&self, game_id: &GameId, record: &MoveRecord) -> Result<()>;

    /// Flags an existing record as terminal with `outcome`.
    async fn mark_terminal(&self, game_id: &GameId, move_id: &MoveId, outcome: Outcome)
        -> Result<()>;

    /// Games newest first, `page_size` at a time, resuming after `after`.
    async fn list_games(&self, page_size: usize, after: Option<&PageCursor>) -> Result<Page>;

    /// Every game's summary, newest first.
    async fn all_summaries(&self) -> Result<Vec<GameSummary>> {
        let mut summaries = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        loop {
            let page = self.list_games(100, cursor.as_ref()).await?;
            summaries.extend(page.games);
            match page.next_cursor {
                Some(next) => cursor = Some(next.parse()?),
                None => break,
            }
        }
        Ok(summaries)
    }
}
