//! PGN parsing into replayable move lines

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use shakmaty::{Chess, Position};
use std::fs;
use std::io::Cursor;
use std::ops::ControlFlow;
use std::path::Path;

use crate::error::{Error, Result};
use crate::rules::{MoveDescriptor, StandardRules};

/// One half-move of a parsed game.
#[derive(Debug, Clone)]
pub struct Ply {
    pub san: String,
    pub mv: MoveDescriptor,
    /// Position after the move.
    pub position: Chess,
}

impl Ply {
    pub fn fen(&self) -> String {
        StandardRules::to_fen(&self.position)
    }
}

/// Main line of a game, variations dropped.
#[derive(Debug, Clone)]
pub struct PgnGame {
    pub event: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub plies: Vec<Ply>,
}

impl PgnGame {
    pub fn name(&self) -> String {
        match (&self.event, &self.white, &self.black) {
            (Some(event), _, _) => event.clone(),
            (None, Some(white), Some(black)) => format!("{} vs {}", white, black),
            _ => "Unnamed game".to_string(),
        }
    }

    pub fn final_position(&self) -> Chess {
        self.plies
            .last()
            .map(|p| p.position.clone())
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct HeaderTags {
    event: Option<String>,
    white: Option<String>,
    black: Option<String>,
    result: Option<String>,
}

struct LineBuilder {
    tags: HeaderTags,
    plies: Vec<Ply>,
    position: Chess,
    failure: Option<String>,
}

struct PlyCollector;

impl Visitor for PlyCollector {
    type Tags = HeaderTags;
    type Movetext = LineBuilder;
    type Output = std::result::Result<PgnGame, String>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(HeaderTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let text = value.decode_utf8_lossy().to_string();

        match name {
            b"Event" => tags.event = Some(text),
            b"White" => tags.white = Some(text),
            b"Black" => tags.black = Some(text),
            b"Result" => tags.result = Some(text),
            _ => {}
        }

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(LineBuilder {
            tags,
            plies: Vec::new(),
            position: Chess::default(),
            failure: None,
        })
    }

    fn san(&mut self, line: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        if line.failure.is_some() {
            return ControlFlow::Continue(());
        }

        let text = san.to_string();
        let played = san
            .san
            .to_move(&line.position)
            .ok()
            .and_then(|m| {
                let mv = StandardRules::describe(&m)?;
                let next = line.position.clone().play(m).ok()?;
                Some((mv, next))
            });

        match played {
            Some((mv, next)) => {
                line.position = next.clone();
                line.plies.push(Ply {
                    san: text,
                    mv,
                    position: next,
                });
            }
            None => {
                line.failure = Some(format!(
                    "illegal move {} at ply {}",
                    text,
                    line.plies.len() + 1
                ));
            }
        }

        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _line: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, line: Self::Movetext) -> Self::Output {
        if let Some(failure) = line.failure {
            return Err(failure);
        }
        Ok(PgnGame {
            event: line.tags.event,
            white: line.tags.white,
            black: line.tags.black,
            result: line.tags.result,
            plies: line.plies,
        })
    }
}

pub fn parse_pgn_file<P: AsRef<Path>>(path: P) -> Result<Vec<PgnGame>> {
    let contents = fs::read_to_string(path)?;
    parse_pgn_string(&contents)
}

/// Parses every game in `pgn`. Games with an illegal move are skipped;
/// it is an error if none are left.
pub fn parse_pgn_string(pgn: &str) -> Result<Vec<PgnGame>> {
    let mut parser = PlyCollector;
    let mut games: Vec<PgnGame> = Vec::new();

    let cursor = Cursor::new(pgn.as_bytes());
    let mut reader = pgn_reader::Reader::new(cursor);

    loop {
        match reader.read_game(&mut parser) {
            Ok(Some(Ok(game))) => games.push(game),
            Ok(Some(Err(failure))) => {
                tracing::warn!(%failure, "skipping unplayable PGN game");
            }
            Ok(None) => break,
            Err(e) => return Err(Error::Pgn(e.to_string())),
        }
    }

    if games.is_empty() {
        Err(Error::Pgn("no valid games found".to_string()))
    } else {
        Ok(games)
    }
}
