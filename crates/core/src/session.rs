//! Game session controller
//!
//! Drives one player's view of a game: load from a token (or start fresh),
//! validate a move through the rules oracle, stage it, and persist it as a
//! new tree node once confirmed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{self, GameState};
use crate::error::{Error, Result};
use crate::id::IdSource;
use crate::rules::{Classification, MoveDescriptor, Rules};
use crate::storage::{GameDocument, GameStore, MoveRecord};
use crate::tree::ancestry;

/// Source of record timestamps, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }
}

/// A validated move waiting for the player to confirm it.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedMove {
    /// Already carries its terminal flag and outcome when the move ends the game.
    pub record: MoveRecord,
    pub classification: Classification,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Uninitialized,
    Loaded(GameState),
    AwaitingConfirmation {
        current: GameState,
        staged: StagedMove,
    },
}

/// Where the session stands after a load or a confirmed move.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub token: String,
    pub state: GameState,
    /// True when `open` had to start a new game.
    pub fresh: bool,
}

impl Snapshot {
    fn of(state: GameState, fresh: bool) -> Self {
        Self {
            token: state.encode(),
            state,
            fresh,
        }
    }
}

pub struct GameSession {
    store: Arc<dyn GameStore>,
    rules: Arc<dyn Rules>,
    ids: Box<dyn IdSource>,
    clock: Arc<dyn Clock>,
    state: SessionState,
    /// Positions before the current one along its line, oldest first.
    line: Vec<String>,
}

impl GameSession {
    pub fn new(
        store: Arc<dyn GameStore>,
        rules: Arc<dyn Rules>,
        ids: Box<dyn IdSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            rules,
            ids,
            clock,
            state: SessionState::Uninitialized,
            line: Vec::new(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current(&self) -> Option<&GameState> {
        match &self.state {
            SessionState::Uninitialized => None,
            SessionState::Loaded(current) => Some(current),
            SessionState::AwaitingConfirmation { current, .. } => Some(current),
        }
    }

    pub fn staged(&self) -> Option<&StagedMove> {
        match &self.state {
            SessionState::AwaitingConfirmation { staged, .. } => Some(staged),
            _ => None,
        }
    }

    pub fn token(&self) -> Option<String> {
        self.current().map(GameState::encode)
    }

    /// Classification of the current position, including repetition along
    /// the restored line.
    pub fn classification(&self) -> Result<Classification> {
        let current = self.current().ok_or(Error::NotLoaded)?;
        self.rules.classify_line(&current.position, &self.line)
    }

    /// Decodes `token` and makes it the current position.
    ///
    /// Does not touch the store, so the line history starts empty.
    pub fn load_from_token(&mut self, token: &str) -> Result<&GameState> {
        let state = codec::decode(token, self.rules.as_ref())?;
        self.line.clear();
        self.state = SessionState::Loaded(state);
        self.current().ok_or(Error::NotLoaded)
    }

    /// Entry point for a page load.
    ///
    /// A token that decodes is loaded as-is; a missing or undecodable token
    /// starts a new game instead.
    pub async fn open(&mut self, token: Option<&str>) -> Result<Snapshot> {
        if let Some(token) = token {
            match self.resume(token).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) => {
                    tracing::warn!(error = %e, "could not decode game token, starting a new game");
                }
            }
        }

        let mut snapshot = self.start_new_game().await?;
        snapshot.fresh = true;
        Ok(snapshot)
    }

    /// Like `load_from_token`, and also checks the token against the stored
    /// game and restores the line history from it.
    ///
    /// A token naming a move the stored game does not have, or carrying a
    /// position that differs from the stored one, is rejected. A game the
    /// store does not know, or a store that cannot be read, only costs the
    /// line history.
    pub async fn resume(&mut self, token: &str) -> Result<Snapshot> {
        let state = codec::decode(token, self.rules.as_ref())?;
        let line = stored_line(self.store.as_ref(), &state).await?;
        self.line = line;
        self.state = SessionState::Loaded(state.clone());
        Ok(Snapshot::of(state, false))
    }

    /// Creates and persists a new game at the starting position.
    pub async fn start_new_game(&mut self) -> Result<Snapshot> {
        let game_id = self.ids.next_id();
        let move_id = self.ids.next_id();
        let position = self.rules.new_position();

        let root = MoveRecord::root(move_id.clone(), position.clone(), self.clock.now_millis());
        let doc = GameDocument::new(game_id.clone(), root);
        self.store.create_game(&doc).await?;
        tracing::info!(game_id = %game_id, "started new game");

        let state = GameState::new(game_id, move_id, position);
        self.line.clear();
        self.state = SessionState::Loaded(state.clone());
        Ok(Snapshot::of(state, false))
    }

    /// Validates `mv` against the current position and stages the result.
    ///
    /// An illegal move leaves the session exactly as it was.
    pub fn submit_move(&mut self, mv: MoveDescriptor) -> Result<&StagedMove> {
        let current = match &self.state {
            SessionState::Uninitialized => return Err(Error::NotLoaded),
            SessionState::AwaitingConfirmation { .. } => return Err(Error::MovePending),
            SessionState::Loaded(current) => current.clone(),
        };

        let position = self.rules.apply_move(&current.position, &mv)?;

        let mut history = self.line.clone();
        history.push(current.position.clone());
        let classification = self.rules.classify_line(&position, &history)?;
        let side_to_move = self.rules.side_to_move(&position)?;

        let mut record = MoveRecord::child(
            self.ids.next_id(),
            current.move_id.clone(),
            mv,
            position,
            self.clock.now_millis(),
        );
        if let Some(outcome) = classification.outcome(side_to_move) {
            record.mark_terminal(outcome);
        }

        self.state = SessionState::AwaitingConfirmation {
            current,
            staged: StagedMove {
                record,
                classification,
            },
        };
        self.staged().ok_or(Error::NothingStaged)
    }

    /// Persists the staged move and advances to it.
    ///
    /// On a persistence failure the move stays staged so the caller can retry.
    pub async fn confirm_move(&mut self, contributor: Option<&str>) -> Result<Snapshot> {
        let (game_id, previous, mut record) = match &self.state {
            SessionState::AwaitingConfirmation { current, staged } => (
                current.game_id.clone(),
                current.position.clone(),
                staged.record.clone(),
            ),
            _ => return Err(Error::NothingStaged),
        };
        record.contributor = contributor.map(str::trim).unwrap_or_default().to_string();

        if let Err(e) = self.store.append_move(&game_id, &record).await {
            tracing::warn!(game_id = %game_id, move_id = %record.id, error = %e, "failed to persist move");
            return Err(e);
        }
        tracing::info!(game_id = %game_id, move_id = %record.id, terminal = record.is_terminal, "move confirmed");

        self.line.push(previous);
        let state = GameState::new(game_id, record.id, record.position);
        self.state = SessionState::Loaded(state.clone());
        Ok(Snapshot::of(state, false))
    }

    /// Drops the staged move, if any.
    pub fn cancel(&mut self) {
        if let SessionState::AwaitingConfirmation { current, .. } = &self.state {
            self.state = SessionState::Loaded(current.clone());
        }
    }
}

/// Positions before `state` along its stored line, oldest first.
async fn stored_line(store: &dyn GameStore, state: &GameState) -> Result<Vec<String>> {
    let doc = match store.get(&state.game_id).await {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            tracing::debug!(game_id = %state.game_id, "game not stored, no line history");
            return Ok(Vec::new());
        }
        Err(e) => {
            tracing::warn!(game_id = %state.game_id, error = %e, "could not load line history");
            return Ok(Vec::new());
        }
    };

    let record = doc.moves.get(&state.move_id).ok_or_else(|| {
        Error::MalformedToken(format!(
            "game {} has no move {}",
            state.game_id, state.move_id
        ))
    })?;
    if record.position != state.position {
        return Err(Error::InvalidPosition(format!(
            "position does not match move {} of game {}",
            state.move_id, state.game_id
        )));
    }

    match ancestry(&doc.moves, &state.move_id) {
        Ok(chain) => Ok(chain
            .split_last()
            .map(|(_, earlier)| earlier.iter().map(|r| r.position.clone()).collect())
            .unwrap_or_default()),
        Err(e) => {
            tracing::warn!(game_id = %state.game_id, error = %e, "could not walk move ancestry");
            Ok(Vec::new())
        }
    }
}
