//! Server-side board rendering

use shakmaty::{Chess, Color, File, Piece, Position, Rank, Role, Square};

use chess_anywhere_core::{StandardRules, Result};

pub struct Cell {
    pub square: String,
    pub glyph: &'static str,
    pub dark: bool,
}

pub struct BoardView {
    /// Rank 8 first, so rows render top to bottom from White's side.
    pub rows: Vec<Vec<Cell>>,
    pub legal_moves: Vec<MoveOption>,
}

/// A legal move offered as a button.
pub struct MoveOption {
    pub from: String,
    pub to: String,
    pub label: String,
}

fn glyph(piece: Piece) -> &'static str {
    match (piece.color, piece.role) {
        (Color::White, Role::King) => "♔",
        (Color::White, Role::Queen) => "♕",
        (Color::White, Role::Rook) => "♖",
        (Color::White, Role::Bishop) => "♗",
        (Color::White, Role::Knight) => "♘",
        (Color::White, Role::Pawn) => "♙",
        (Color::Black, Role::King) => "♚",
        (Color::Black, Role::Queen) => "♛",
        (Color::Black, Role::Rook) => "♜",
        (Color::Black, Role::Bishop) => "♝",
        (Color::Black, Role::Knight) => "♞",
        (Color::Black, Role::Pawn) => "♟",
    }
}

impl BoardView {
    pub fn from_fen(fen: &str) -> Result<Self> {
        let pos = StandardRules::new().parse(fen)?;
        Ok(Self::from_position(&pos))
    }

    pub fn from_position(pos: &Chess) -> Self {
        let board = pos.board();
        let mut rows = Vec::with_capacity(8);

        for (rank_idx, rank) in Rank::ALL.iter().enumerate().rev() {
            let row = File::ALL
                .iter()
                .enumerate()
                .map(|(file_idx, file)| {
                    let square = Square::from_coords(*file, *rank);
                    Cell {
                        square: square.to_string(),
                        glyph: board.piece_at(square).map(glyph).unwrap_or(""),
                        dark: (rank_idx + file_idx) % 2 == 0,
                    }
                })
                .collect();
            rows.push(row);
        }

        let mut legal_moves: Vec<MoveOption> = pos
            .legal_moves()
            .iter()
            .filter_map(StandardRules::describe)
            // Promotions are offered once; the queen is the default.
            .filter(|mv| matches!(mv.promotion, None | Some(Role::Queen)))
            .map(|mv| MoveOption {
                from: mv.from.to_string(),
                to: mv.to.to_string(),
                label: format!("{}-{}", mv.from, mv.to),
            })
            .collect();
        legal_moves.sort_by(|a, b| a.label.cmp(&b.label));

        Self { rows, legal_moves }
    }
}
