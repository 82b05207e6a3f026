//! Board module tests.
//!
//! - `fen.rs` - FEN parsing and formatting
//! - `proptest.rs` - Property-based tests over random positions

mod fen;

use rand::prelude::*;

use crate::board::{Color, Piece, Position, Square};

/// Random legal-looking position: both kings plus up to `extra` other pieces.
///
/// Pawns never land on the back ranks, so the result always validates.
pub(crate) fn random_position(rng: &mut StdRng, extra: usize) -> Position {
    let mut position = Position::empty();
    let mut free: Vec<Square> = Square::all().collect();
    free.shuffle(rng);

    for color in Color::BOTH {
        if let Some(sq) = free.pop() {
            position.put_piece(sq, color, Piece::King);
        }
    }

    for _ in 0..extra.min(30) {
        let Some(sq) = free.pop() else { break };
        let color = if rng.gen_bool(0.5) { Color::White } else { Color::Black };
        let mut piece = Piece::NON_KING[rng.gen_range(0..Piece::NON_KING.len())];
        if piece == Piece::Pawn && (sq.rank() == 0 || sq.rank() == 7) {
            piece = Piece::Knight;
        }
        position.put_piece(sq, color, piece);
    }

    if rng.gen_bool(0.5) {
        position.set_side_to_move(Color::Black);
    }
    position.set_clocks(rng.gen_range(0..100), rng.gen_range(1..300));
    position
}
