//! Standard chess rules on top of shakmaty

use shakmaty::fen::Fen;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, File, Move, Position, Role, Square};

use super::{Classification, MoveDescriptor, Rules};
use crate::error::{Error, Result};

/// Halfmove clock value at which the fifty-move rule applies.
const FIFTY_MOVE_PLIES: u32 = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, position: &str) -> Result<Chess> {
        let fen: Fen = position
            .trim()
            .parse()
            .map_err(|e| Error::InvalidPosition(format!("{}: {:?}", e, position)))?;

        fen.into_position(CastlingMode::Standard)
            .map_err(|e| Error::InvalidPosition(format!("{}: {:?}", e, position)))
    }

    pub fn to_fen(position: &Chess) -> String {
        Fen::from_position(position, EnPassantMode::Legal).to_string()
    }

    /// Origin and target squares of a legal move. Castling is reported as
    /// the king's two-square step. `None` for piece drops.
    pub fn describe(mv: &Move) -> Option<MoveDescriptor> {
        match mv {
            Move::Normal {
                from, to, promotion, ..
            } => Some(MoveDescriptor {
                from: *from,
                to: *to,
                promotion: *promotion,
            }),
            Move::EnPassant { from, to } => Some(MoveDescriptor::new(*from, *to)),
            Move::Castle { king, rook } => {
                let file = if rook.file() > king.file() {
                    File::G
                } else {
                    File::C
                };
                Some(MoveDescriptor::new(
                    *king,
                    Square::from_coords(file, king.rank()),
                ))
            }
            Move::Put { .. } => None,
        }
    }
}

impl Rules for StandardRules {
    fn new_position(&self) -> String {
        Self::to_fen(&Chess::default())
    }

    fn validate(&self, position: &str) -> Result<()> {
        self.parse(position).map(|_| ())
    }

    fn apply_move(&self, position: &str, mv: &MoveDescriptor) -> Result<String> {
        let current = self.parse(position)?;

        let uci = UciMove::Normal {
            from: mv.from,
            to: mv.to,
            promotion: mv.promotion,
        };

        let legal = match uci.to_move(&current) {
            Ok(m) => m,
            Err(_) if mv.promotion.is_none() => {
                // Pawn reaching the last rank without a choice: promote to queen.
                let queening = UciMove::Normal {
                    from: mv.from,
                    to: mv.to,
                    promotion: Some(Role::Queen),
                };
                queening
                    .to_move(&current)
                    .map_err(|_| Error::IllegalMove(mv.to_string()))?
            }
            Err(_) => return Err(Error::IllegalMove(mv.to_string())),
        };

        let next = current
            .play(legal)
            .map_err(|_| Error::IllegalMove(mv.to_string()))?;

        Ok(Self::to_fen(&next))
    }

    fn classify(&self, position: &str) -> Result<Classification> {
        let pos = self.parse(position)?;

        let classification = if pos.is_checkmate() {
            Classification::Checkmate
        } else if pos.is_stalemate() {
            Classification::Stalemate
        } else if pos.is_insufficient_material() {
            Classification::InsufficientMaterial
        } else if pos.halfmoves() >= FIFTY_MOVE_PLIES {
            Classification::Draw
        } else {
            Classification::InProgress
        };

        Ok(classification)
    }

    fn side_to_move(&self, position: &str) -> Result<Color> {
        Ok(self.parse(position)?.turn())
    }
}
