//! Chess rules oracle
//!
//! The session controller never inspects positions itself. It hands FEN
//! strings and candidate moves to a [`Rules`] implementation and gets back
//! new FEN strings, rejections and terminal-state classifications.

pub mod standard;

use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role, Square};

use crate::error::{Error, Result};
use crate::storage::Outcome;

pub use standard::StandardRules;

/// A candidate move as the board UI reports it: origin and target square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMove", into = "RawMove")]
pub struct MoveDescriptor {
    pub from: Square,
    pub to: Square,
    /// Piece to promote to; a queen is assumed when a promotion is required
    /// and none is given.
    pub promotion: Option<Role>,
}

impl MoveDescriptor {
    pub fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Parses square names such as `"e2"` and `"e4"`.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        let parse_square = |s: &str| {
            s.trim()
                .to_ascii_lowercase()
                .parse::<Square>()
                .map_err(|_| Error::IllegalMove(format!("unknown square {:?}", s)))
        };
        Ok(Self::new(parse_square(from)?, parse_square(to)?))
    }

    pub fn with_promotion(mut self, role: Role) -> Self {
        self.promotion = Some(role);
        self
    }
}

impl fmt::Display for MoveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "={}", role.char().to_ascii_uppercase())?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RawMove {
    from: String,
    to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    promotion: Option<char>,
}

impl TryFrom<RawMove> for MoveDescriptor {
    type Error = Error;

    fn try_from(raw: RawMove) -> Result<Self> {
        let mv = MoveDescriptor::parse(&raw.from, &raw.to)?;
        match raw.promotion {
            None => Ok(mv),
            Some(c) => Role::from_char(c.to_ascii_lowercase())
                .map(|role| mv.with_promotion(role))
                .ok_or_else(|| Error::IllegalMove(format!("unknown promotion piece {:?}", c))),
        }
    }
}

impl From<MoveDescriptor> for RawMove {
    fn from(mv: MoveDescriptor) -> Self {
        RawMove {
            from: mv.from.to_string(),
            to: mv.to.to_string(),
            promotion: mv.promotion.map(|r| r.char()),
        }
    }
}

/// Terminal-state classification of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Classification {
    Checkmate,
    Stalemate,
    /// Fifty-move rule.
    Draw,
    ThreefoldRepetition,
    InsufficientMaterial,
    InProgress,
}

impl Classification {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Classification::InProgress)
    }

    /// Game result for a position with `side_to_move` to play.
    pub fn outcome(&self, side_to_move: Color) -> Option<Outcome> {
        match self {
            Classification::InProgress => None,
            Classification::Checkmate => Some(match side_to_move {
                Color::White => Outcome::BlackWins,
                Color::Black => Outcome::WhiteWins,
            }),
            _ => Some(Outcome::Draw),
        }
    }

    /// Human-readable game status.
    pub fn status_line(&self, side_to_move: Color) -> String {
        match self {
            Classification::Checkmate => {
                format!("Checkmate! {} wins!", color_name(side_to_move.other()))
            }
            Classification::Draw => "Draw!".to_string(),
            Classification::Stalemate => "Stalemate!".to_string(),
            Classification::ThreefoldRepetition => "Draw by threefold repetition!".to_string(),
            Classification::InsufficientMaterial => "Draw by insufficient material!".to_string(),
            Classification::InProgress => format!("Current turn: {}", color_name(side_to_move)),
        }
    }
}

pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "White",
        Color::Black => "Black",
    }
}

/// The external chess-rules oracle.
pub trait Rules: Send + Sync {
    /// FEN of the standard starting position.
    fn new_position(&self) -> String;

    /// Fails with [`Error::InvalidPosition`] unless `position` is a legal board description.
    fn validate(&self, position: &str) -> Result<()>;

    /// Plays `mv` on a copy of `position`, failing with [`Error::IllegalMove`] if it is not legal.
    fn apply_move(&self, position: &str, mv: &MoveDescriptor) -> Result<String>;

    /// Classifies a single position. Repetition cannot be seen here.
    fn classify(&self, position: &str) -> Result<Classification>;

    fn side_to_move(&self, position: &str) -> Result<Color>;

    /// Classifies `position` as reached after the positions in `earlier`,
    /// which adds threefold repetition.
    fn classify_line(&self, position: &str, earlier: &[String]) -> Result<Classification> {
        let classification = self.classify(position)?;
        if classification.is_terminal() {
            return Ok(classification);
        }

        let key = repetition_key(position);
        let seen = earlier
            .iter()
            .filter(|p| repetition_key(p) == key)
            .count();

        if seen + 1 >= 3 {
            Ok(Classification::ThreefoldRepetition)
        } else {
            Ok(classification)
        }
    }
}

/// Placement, side to move, castling rights and en passant square.
fn repetition_key(position: &str) -> Vec<&str> {
    position.split_whitespace().take(4).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_display() {
        let mv = MoveDescriptor::parse("e2", "E4").unwrap();
        assert_eq!(mv.to_string(), "e2-e4");

        let promo = MoveDescriptor::parse("e7", "e8").unwrap().with_promotion(Role::Knight);
        assert_eq!(promo.to_string(), "e7-e8=N");
    }

    #[test]
    fn test_descriptor_rejects_unknown_square() {
        assert!(matches!(
            MoveDescriptor::parse("e9", "e4"),
            Err(Error::IllegalMove(_))
        ));
    }

    #[test]
    fn test_descriptor_json_shape() {
        let mv = MoveDescriptor::parse("g1", "f3").unwrap();
        let json = serde_json::to_value(mv).unwrap();
        assert_eq!(json, serde_json::json!({ "from": "g1", "to": "f3" }));

        let promo: MoveDescriptor =
            serde_json::from_str(r#"{"from":"a7","to":"a8","promotion":"q"}"#).unwrap();
        assert_eq!(promo.promotion, Some(Role::Queen));
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            Classification::Checkmate.outcome(Color::White),
            Some(Outcome::BlackWins)
        );
        assert_eq!(
            Classification::Checkmate.outcome(Color::Black),
            Some(Outcome::WhiteWins)
        );
        assert_eq!(
            Classification::Stalemate.outcome(Color::White),
            Some(Outcome::Draw)
        );
        assert_eq!(Classification::InProgress.outcome(Color::White), None);
    }

    #[test]
    fn test_status_lines() {
        assert_eq!(
            Classification::Checkmate.status_line(Color::White),
            "Checkmate! Black wins!"
        );
        assert_eq!(
            Classification::InProgress.status_line(Color::Black),
            "Current turn: Black"
        );
    }
}
