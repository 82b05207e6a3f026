//! Core chess types.
//!
//! - `Piece` and `Color` - chess piece types and colors
//! - `Square` - board square as (rank, file)
//! - `Bitboard` - 64-bit square set
//! - `CastlingRights` - castling state

mod bitboard;
mod castling;
mod piece;
mod square;

pub use bitboard::{Bitboard, BitboardIter};
pub use castling::CastlingRights;
pub use piece::{Color, Piece};
pub use square::{Square, SQUARE_COUNT};
