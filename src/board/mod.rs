//! Chess position representation.
//!
//! Holds piece placement and the FEN game state that training samples
//! carry. There is no move generation here: positions arrive already
//! played, either from a FEN string or a packed training record.
//!
//! # Example
//! ```
//! use teras_nnue::board::{Color, Piece, Position};
//!
//! let position: Position = "4k3/8/8/8/8/8/8/4K2R w K - 0 1".parse().unwrap();
//! assert_eq!(position.pieces(Color::White, Piece::Rook).popcount(), 1);
//! ```

mod error;
mod fen;
mod position;
mod types;

#[cfg(test)]
pub(crate) mod tests;

pub use error::{FenError, PositionError, SquareError};
pub use position::{Position, MAX_PIECES};
pub use types::{Bitboard, BitboardIter, CastlingRights, Color, Piece, Square, SQUARE_COUNT};
