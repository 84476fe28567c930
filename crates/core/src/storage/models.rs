//! Persisted game and move records

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{GameId, Id, MoveId};
use crate::rules::MoveDescriptor;
use crate::tree::GameStats;

/// Final result recorded on a terminal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
    Unfinished,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::WhiteWins => "white",
            Outcome::BlackWins => "black",
            Outcome::Draw => "draw",
            Outcome::Unfinished => "unfinished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "white" => Some(Outcome::WhiteWins),
            "black" => Some(Outcome::BlackWins),
            "draw" => Some(Outcome::Draw),
            "unfinished" => Some(Outcome::Unfinished),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Outcome::WhiteWins => "White wins",
            Outcome::BlackWins => "Black wins",
            Outcome::Draw => "Draw",
            Outcome::Unfinished => "Unfinished",
        }
    }
}

/// One node of a game's move history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub id: MoveId,
    /// FEN after the move.
    pub position: String,
    /// `None` only for the root record.
    #[serde(rename = "move")]
    pub mv: Option<MoveDescriptor>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub parent_move_id: Option<MoveId>,
    #[serde(default)]
    pub contributor: String,
    #[serde(default)]
    pub is_terminal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl MoveRecord {
    pub fn root(id: MoveId, position: String, created_at: i64) -> Self {
        Self {
            id,
            position,
            mv: None,
            created_at,
            parent_move_id: None,
            contributor: "Initial".to_string(),
            is_terminal: false,
            outcome: None,
        }
    }

    pub fn child(
        id: MoveId,
        parent: MoveId,
        mv: MoveDescriptor,
        position: String,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            position,
            mv: Some(mv),
            created_at,
            parent_move_id: Some(parent),
            contributor: String::new(),
            is_terminal: false,
            outcome: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_move_id.is_none()
    }

    pub fn mark_terminal(&mut self, outcome: Outcome) {
        self.is_terminal = true;
        self.outcome = Some(outcome);
    }
}

/// Move records of one game keyed by move id.
pub type Moves = BTreeMap<MoveId, MoveRecord>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameDocument {
    pub game_id: GameId,
    pub starting_position: String,
    pub created_at: i64,
    pub moves: Moves,
}

impl GameDocument {
    /// A new game holding only its root record.
    pub fn new(game_id: GameId, root: MoveRecord) -> Self {
        let mut moves = Moves::new();
        let starting_position = root.position.clone();
        let created_at = root.created_at;
        moves.insert(root.id.clone(), root);
        Self {
            game_id,
            starting_position,
            created_at,
            moves,
        }
    }

    pub fn root(&self) -> Option<&MoveRecord> {
        self.moves.values().find(|m| m.is_root())
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            game_id: self.game_id.clone(),
            starting_position: self.starting_position.clone(),
            created_at: self.created_at,
            move_count: self.moves.len(),
            stats: GameStats::from_moves(&self.moves),
        }
    }
}

/// Listing entry for a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub game_id: GameId,
    pub starting_position: String,
    pub created_at: i64,
    pub move_count: usize,
    pub stats: GameStats,
}

/// Position after the last listed game, for fetching the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: i64,
    pub game_id: GameId,
}

impl PageCursor {
    pub fn after(summary: &GameSummary) -> Self {
        Self {
            created_at: summary.created_at,
            game_id: summary.game_id.clone(),
        }
    }

    /// True if a game sorts after this cursor (created_at desc, game id desc).
    pub fn precedes(&self, created_at: i64, game_id: &Id) -> bool {
        created_at < self.created_at || (created_at == self.created_at && *game_id < self.game_id)
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.created_at, self.game_id)
    }
}

impl FromStr for PageCursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Storage(format!("invalid page cursor {:?}", s));
        let (millis, id) = s.rsplit_once('-').ok_or_else(invalid)?;
        Ok(Self {
            created_at: millis.parse().map_err(|_| invalid())?,
            game_id: Id::parse(id).map_err(|_| invalid())?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub games: Vec<GameSummary>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Builds a page from up to `page_size + 1` summaries; the extra one only
    /// signals that more games exist.
    pub fn from_overfetch(mut games: Vec<GameSummary>, page_size: usize) -> Self {
        let has_more = games.len() > page_size;
        games.truncate(page_size);
        let next_cursor = if has_more {
            games.last().map(|g| PageCursor::after(g).to_string())
        } else {
            None
        };
        Self { games, next_cursor }
    }
}
