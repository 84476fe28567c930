//! In-process game store

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::models::*;
use super::GameStore;
use crate::error::{Error, Result};
use crate::id::{GameId, MoveId};

/// Keeps every game document in memory. Used by tests and the demo binary.
#[derive(Default)]
pub struct MemoryStore {
    games: RwLock<BTreeMap<GameId, GameDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.games.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.games.read().await.is_empty()
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn get(&self, game_id: &GameId) -> Result<Option<GameDocument>> {
        Ok(self.games.read().await.get(game_id).cloned())
    }

    async fn create_game(&self, game: &GameDocument) -> Result<()> {
        let mut games = self.games.write().await;
        if games.contains_key(&game.game_id) {
            return Err(Error::Storage(format!("game {} already exists", game.game_id)));
        }
        games.insert(game.game_id.clone(), game.clone());
        Ok(())
    }

    async fn append_move(&self, game_id: &GameId, record: &MoveRecord) -> Result<()> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(game_id)
            .ok_or_else(|| Error::GameNotFound(game_id.to_string()))?;

        if game.moves.contains_key(&record.id) {
            return Err(Error::DuplicateMove {
                game_id: game_id.to_string(),
                move_id: record.id.to_string(),
            });
        }
        match &record.parent_move_id {
            None => {
                return Err(Error::Storage(format!(
                    "game {} already has a root record",
                    game_id
                )))
            }
            Some(parent) if !game.moves.contains_key(parent) => {
                return Err(Error::MoveNotFound {
                    game_id: game_id.to_string(),
                    move_id: parent.to_string(),
                })
            }
            Some(_) => {}
        }
        game.moves.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn mark_terminal(
        &self,
        game_id: &GameId,
        move_id: &MoveId,
        outcome: Outcome,
    ) -> Result<()> {
        let mut games = self.games.write().await;
        let game = games
            .get_mut(game_id)
            .ok_or_else(|| Error::GameNotFound(game_id.to_string()))?;
        let record = game
            .moves
            .get_mut(move_id)
            .ok_or_else(|| Error::MoveNotFound {
                game_id: game_id.to_string(),
                move_id: move_id.to_string(),
            })?;
        record.mark_terminal(outcome);
        Ok(())
    }

    async fn list_games(&self, page_size: usize, after: Option<&PageCursor>) -> Result<Page> {
        let games = self.games.read().await;
        let mut docs: Vec<&GameDocument> = games
            .values()
            .filter(|g| after.map_or(true, |c| c.precedes(g.created_at, &g.game_id)))
            .collect();
        docs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.game_id.cmp(&a.game_id))
        });

        let summaries = docs
            .into_iter()
            .take(page_size + 1)
            .map(GameDocument::summary)
            .collect();
        Ok(Page::from_overfetch(summaries, page_size))
    }
}
