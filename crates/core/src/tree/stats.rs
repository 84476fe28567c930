//! Per-game and site-wide statistics over move trees

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::storage::{GameSummary, Moves, Outcome};

/// Outcome counts over the leaves of one game's tree.
///
/// Every leaf is one "parallel game": a line nobody has continued yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    pub total_parallel: u32,
    pub ongoing: u32,
    pub white_wins: u32,
    pub black_wins: u32,
    pub draws: u32,
}

impl GameStats {
    pub fn from_moves(moves: &Moves) -> Self {
        let parents: HashSet<_> = moves
            .values()
            .filter_map(|m| m.parent_move_id.as_ref())
            .collect();

        let mut stats = GameStats::default();
        for leaf in moves.values().filter(|m| !parents.contains(&m.id)) {
            stats.total_parallel += 1;
            match (leaf.is_terminal, leaf.outcome) {
                (true, Some(Outcome::WhiteWins)) => stats.white_wins += 1,
                (true, Some(Outcome::BlackWins)) => stats.black_wins += 1,
                (true, Some(Outcome::Draw)) => stats.draws += 1,
                _ => stats.ongoing += 1,
            }
        }
        stats
    }

    fn absorb(&mut self, other: &GameStats) {
        self.total_parallel += other.total_parallel;
        self.ongoing += other.ongoing;
        self.white_wins += other.white_wins;
        self.black_wins += other.black_wins;
        self.draws += other.draws;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStats {
    pub total_games: u32,
    pub outcomes: GameStats,
    pub average_parallel_games: f64,
    /// Games per move-count bucket of ten, keyed by bucket start.
    pub moves_per_game: BTreeMap<u32, u32>,
}

impl SiteStats {
    pub fn add(&mut self, game: &GameSummary) {
        self.total_games += 1;
        self.outcomes.absorb(&game.stats);
        let bucket = (game.move_count as u32 / 10) * 10;
        *self.moves_per_game.entry(bucket).or_insert(0) += 1;
        self.average_parallel_games =
            self.outcomes.total_parallel as f64 / self.total_games as f64;
    }

    pub fn from_games<'a, I>(games: I) -> Self
    where
        I: IntoIterator<Item = &'a GameSummary>,
    {
        let mut stats = SiteStats::default();
        for game in games {
            stats.add(game);
        }
        stats
    }

    /// Histogram rows labelled like `"10-19"`.
    pub fn move_buckets(&self) -> Vec<(String, u32)> {
        self.moves_per_game
            .iter()
            .map(|(start, count)| (format!("{}-{}", start, start + 9), *count))
            .collect()
    }
}
