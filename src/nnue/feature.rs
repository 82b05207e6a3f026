//! Perspective-relative piece-square features.
//!
//! Every non-king piece on the board activates one feature for each
//! perspective. From a perspective, a piece is either "ours" (relativity 0)
//! or "theirs" (relativity 1), and Black sees the board mirrored vertically,
//! so both sides share one set of weights.

use super::{FEATURE_COUNT, MAX_ACTIVE_FEATURES};
use crate::board::{Color, Piece, Position, Square, SQUARE_COUNT};

/// Compute the feature index for a piece on a square, seen from `perspective`.
///
/// `index = (relativity * 6 + piece) * 64 + square`, with the square flipped
/// (`a1 <-> a8`) when `perspective` is Black. Always below [`FEATURE_COUNT`].
#[inline]
#[must_use]
pub fn feature_index(perspective: Color, piece_color: Color, piece: Piece, square: Square) -> u32 {
    let oriented_sq = match perspective {
        Color::White => square,
        Color::Black => square.flip_vertical(),
    };
    let relativity = usize::from(piece_color != perspective);
    let index = (relativity * Piece::COUNT + piece.index()) * SQUARE_COUNT + oriented_sq.index();
    debug_assert!(index < FEATURE_COUNT);
    index as u32
}

/// Active features of a position from both perspectives.
///
/// `stm[k]` and `non_stm[k]` describe the same piece. Kings are left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PositionFeatures {
    pub stm: Vec<u32>,
    pub non_stm: Vec<u32>,
}

impl PositionFeatures {
    #[must_use]
    pub fn new(position: &Position) -> Self {
        let mut features = PositionFeatures {
            stm: Vec::with_capacity(MAX_ACTIVE_FEATURES),
            non_stm: Vec::with_capacity(MAX_ACTIVE_FEATURES),
        };
        features.refresh(position);
        features
    }

    /// Recompute in place, reusing the allocations
    pub fn refresh(&mut self, position: &Position) {
        self.stm.clear();
        self.non_stm.clear();

        let stm = position.side_to_move();
        for color in Color::BOTH {
            for piece in Piece::NON_KING {
                for sq in position.pieces(color, piece).iter() {
                    self.stm.push(feature_index(stm, color, piece, sq));
                    self.non_stm.push(feature_index(!stm, color, piece, sq));
                }
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stm.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stm.is_empty()
    }

    /// `(stm, non_stm)` feature pairs, one per piece
    pub fn pairs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.stm.iter().copied().zip(self.non_stm.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn known_indices() {
        // White pawn on a2 from White's view: own pawn, square 8
        assert_eq!(feature_index(Color::White, Color::White, Piece::Pawn, sq("a2")), 8);
        // Same pawn from Black's view: their pawn on a7 (square 48)
        assert_eq!(
            feature_index(Color::Black, Color::White, Piece::Pawn, sq("a2")),
            384 + 48
        );
        // Black queen on d8 from Black's view: own queen on d1
        assert_eq!(
            feature_index(Color::Black, Color::Black, Piece::Queen, sq("d8")),
            4 * 64 + 3
        );
        assert_eq!(
            feature_index(Color::White, Color::Black, Piece::King, sq("h8")),
            767
        );
    }

    #[test]
    fn startpos_features() {
        let features = PositionFeatures::new(&Position::startpos());
        assert_eq!(features.len(), 30);
        assert!(features.stm.iter().all(|&f| (f as usize) < FEATURE_COUNT));

        // The start position is symmetric, so both perspectives see the same set
        let mut stm = features.stm.clone();
        let mut non_stm = features.non_stm.clone();
        stm.sort_unstable();
        non_stm.sort_unstable();
        assert_eq!(stm, non_stm);
    }

    #[test]
    fn kings_are_not_features() {
        let position = Position::try_from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(PositionFeatures::new(&position).is_empty());
    }

    #[test]
    fn side_to_move_swaps_perspectives() {
        let white = Position::try_from_fen("4k3/8/8/3q4/8/8/8/R3K3 w - - 0 1").unwrap();
        let black = Position::try_from_fen("4k3/8/8/3q4/8/8/8/R3K3 b - - 0 1").unwrap();
        let white = PositionFeatures::new(&white);
        let black = PositionFeatures::new(&black);
        assert_eq!(white.stm, black.non_stm);
        assert_eq!(white.non_stm, black.stm);
    }
}
