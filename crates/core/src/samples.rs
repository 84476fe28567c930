//! Sample games for demos: a famous game plus a few random variations of it

use rand::seq::IndexedRandom;
use rand::Rng;
use shakmaty::san::SanPlus;
use shakmaty::{Chess, Move, Position};

use crate::error::{Error, Result};
use crate::id::{GameId, IdSource, MoveId};
use crate::parser::{parse_pgn_string, PgnGame};
use crate::rules::{Classification, Rules, StandardRules};
use crate::session::Clock;
use crate::storage::{GameDocument, GameStore, MoveRecord, Outcome};

pub const FAMOUS_GAMES_PGN: &str = r#"[Event "Immortal Game"]
[White "Adolf Anderssen"]
[Black "Lionel Kieseritzky"]
[Result "1-0"]

1. e4 e5 2. f4 exf4 3. Bc4 Qh4+ 4. Kf1 b5 5. Bxb5 Nf6 6. Nf3 Qh6 7. d3 Nh5
8. Nh4 Qg5 9. Nf5 c6 10. g4 Nf6 11. Rg1 cxb5 12. h4 Qg6 13. h5 Qg5 14. Qf3 Ng8
15. Bxf4 Qf6 16. Nc3 Bc5 17. Nd5 Qxb2 18. Bd6 Bxg1 19. e5 Qxa1+ 20. Ke2 Na6
21. Nxg7+ Kd8 22. Qf6+ Nxf6 23. Be7# 1-0

[Event "Opera Game"]
[White "Paul Morphy"]
[Black "Duke Karl / Count Isouard"]
[Result "1-0"]

1. e4 e5 2. Nf3 d6 3. d4 Bg4 4. dxe5 Bxf3 5. Qxf3 dxe5 6. Bc4 Nf6 7. Qb3 Qe7
8. Nc3 c6 9. Bg5 b5 10. Nxb5 cxb5 11. Bxb5+ Nbd7 12. O-O-O Rd8 13. Rxd7 Rxd7
14. Rd1 Qe6 15. Bxd7+ Nxd7 16. Qb8+ Nxb8 17. Rd8# 1-0

[Event "Evergreen Game"]
[White "Adolf Anderssen"]
[Black "Jean Dufresne"]
[Result "1-0"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. b4 Bxb4 5. c3 Ba5 6. d4 exd4 7. O-O d3
8. Qb3 Qf6 9. e5 Qg6 10. Re1 Nge7 11. Ba3 b5 12. Qxb5 Rb8 13. Qa4 Bb6
14. Nbd2 Bb7 15. Ne4 Qf5 16. Bxd3 Qh5 17. Nf6+ gxf6 18. exf6 Rg8 19. Rad1 Qxf3
20. Rxe7+ Nxe7 21. Qxd7+ Kxd7 22. Bf5+ Ke8 23. Bd7+ Kf8 24. Bxe7# 1-0
"#;

const FAMOUS_CONTRIBUTOR: &str = "Famous Game";
const CONTRIBUTORS: [&str; 5] = ["Alice", "Bob", "Charlie", "David", "Eve"];

/// Random plies swapped into the famous line per variation.
const DEVIATIONS: usize = 3;
/// Random plies added after a variation leaves the famous line unfinished.
const MAX_EXTENSION: usize = 30;

pub fn famous_games() -> Result<Vec<PgnGame>> {
    parse_pgn_string(FAMOUS_GAMES_PGN)
}

/// A generated game, split the way it is written to a store.
#[derive(Debug, Clone)]
pub struct SampleGame {
    pub name: String,
    /// Holds only the root record.
    pub game: GameDocument,
    /// Non-root records, every parent before its children.
    pub moves: Vec<MoveRecord>,
    /// Last record of each line and how that line ended.
    pub endings: Vec<(MoveId, Outcome)>,
}

impl SampleGame {
    /// The complete document with every line's ending applied.
    pub fn document(&self) -> GameDocument {
        let mut doc = self.game.clone();
        for record in &self.moves {
            doc.moves.insert(record.id.clone(), record.clone());
        }
        for (move_id, outcome) in &self.endings {
            if let Some(record) = doc.moves.get_mut(move_id) {
                record.mark_terminal(*outcome);
            }
        }
        doc
    }
}

fn random_move<R: Rng>(pos: &Chess, rng: &mut R) -> Option<Move> {
    pos.legal_moves().choose(rng).cloned()
}

/// The famous line with a few random deviations, extended with random
/// moves if it has not ended.
fn create_variation<R: Rng>(base: &PgnGame, rng: &mut R) -> Vec<(Move, Chess)> {
    let mut line = Vec::new();
    let mut pos = Chess::default();
    if base.plies.is_empty() {
        return line;
    }

    let deviations: Vec<usize> = (0..DEVIATIONS)
        .map(|_| rng.random_range(0..base.plies.len()))
        .collect();

    for (i, ply) in base.plies.iter().enumerate() {
        let next = if deviations.contains(&i) {
            random_move(&pos, rng)
        } else {
            ply.san
                .parse::<SanPlus>()
                .ok()
                .and_then(|san| san.san.to_move(&pos).ok())
        };

        let Some(m) = next else { break };
        let Ok(after) = pos.clone().play(m.clone()) else { break };
        line.push((m, after.clone()));
        pos = after;

        if pos.is_game_over() {
            break;
        }
    }

    let mut extra = 0;
    while !pos.is_game_over() && extra < MAX_EXTENSION {
        let Some(m) = random_move(&pos, rng) else { break };
        let Ok(after) = pos.clone().play(m.clone()) else { break };
        line.push((m, after.clone()));
        pos = after;
        extra += 1;
    }

    line
}

/// How a line ending at `position` finished.
fn line_outcome(rules: &StandardRules, position: &str, earlier: &[String]) -> Result<Outcome> {
    let classification = rules.classify_line(position, earlier)?;
    let side = rules.side_to_move(position)?;
    Ok(match classification {
        Classification::InProgress => Outcome::Unfinished,
        other => other.outcome(side).unwrap_or(Outcome::Unfinished),
    })
}

/// Builds one sample game: the full famous line plus 2 to 4 variations,
/// all hanging off the same root.
pub fn generate_sample_game<R: Rng>(
    base: &PgnGame,
    rng: &mut R,
    ids: &mut dyn IdSource,
    clock: &dyn Clock,
) -> Result<SampleGame> {
    let rules = StandardRules::new();
    let start = rules.new_position();
    let root = MoveRecord::root(ids.next_id(), start.clone(), clock.now_millis());
    let root_id = root.id.clone();
    let game = GameDocument::new(ids.next_id(), root);

    let mut moves = Vec::new();
    let mut endings = Vec::new();

    // The famous game itself always ends with the side to move mated.
    let mut parent = root_id.clone();
    for ply in &base.plies {
        let mut record = MoveRecord::child(
            ids.next_id(),
            parent,
            ply.mv,
            ply.fen(),
            clock.now_millis(),
        );
        record.contributor = FAMOUS_CONTRIBUTOR.to_string();
        parent = record.id.clone();
        moves.push(record);
    }
    if parent != root_id {
        let loser = base.final_position().turn();
        let outcome = Classification::Checkmate
            .outcome(loser)
            .ok_or_else(|| Error::Pgn("famous game has no result".to_string()))?;
        endings.push((parent, outcome));
    }

    let variations = rng.random_range(2..=4);
    for _ in 0..variations {
        let line = create_variation(base, rng);
        let mut parent = root_id.clone();
        let mut earlier = vec![start.clone()];

        for (m, after) in &line {
            let Some(mv) = StandardRules::describe(m) else { continue };
            let fen = StandardRules::to_fen(after);
            let mut record = MoveRecord::child(
                ids.next_id(),
                parent,
                mv,
                fen.clone(),
                clock.now_millis(),
            );
            record.contributor = CONTRIBUTORS
                .choose(rng)
                .copied()
                .unwrap_or_default()
                .to_string();
            parent = record.id.clone();
            moves.push(record);
            earlier.push(fen);
        }

        if parent == root_id {
            continue;
        }
        if let Some((last, before)) = earlier.split_last() {
            endings.push((parent, line_outcome(&rules, last, before)?));
        }
    }

    Ok(SampleGame {
        name: base.name(),
        game,
        moves,
        endings,
    })
}

/// Generates `count` sample games and writes them through `store`.
///
/// A game that fails to store is logged and skipped; the ids of the games
/// that made it are returned.
pub async fn seed_samples<R: Rng + Send>(
    store: &dyn GameStore,
    count: usize,
    bases: &[PgnGame],
    rng: &mut R,
    ids: &mut dyn IdSource,
    clock: &dyn Clock,
) -> Result<Vec<GameId>> {
    let mut created = Vec::with_capacity(count);

    for i in 0..count {
        let base = bases
            .choose(rng)
            .ok_or_else(|| Error::Pgn("no base games to sample from".to_string()))?;
        let sample = generate_sample_game(base, rng, ids, clock)?;
        let game_id = sample.game.game_id.clone();

        match store_sample(store, &sample).await {
            Ok(()) => {
                tracing::info!(
                    game_id = %game_id,
                    base = %sample.name,
                    moves = sample.moves.len(),
                    lines = sample.endings.len(),
                    "seeded sample game {}",
                    i + 1
                );
                created.push(game_id);
            }
            Err(e) => {
                tracing::error!(game_id = %game_id, error = %e, "failed to seed sample game");
            }
        }
    }

    Ok(created)
}

async fn store_sample(store: &dyn GameStore, sample: &SampleGame) -> Result<()> {
    let game_id = &sample.game.game_id;
    store.create_game(&sample.game).await?;
    for record in &sample.moves {
        store.append_move(game_id, record).await?;
    }
    for (move_id, outcome) in &sample.endings {
        store.mark_terminal(game_id, move_id, *outcome).await?;
    }
    Ok(())
}
