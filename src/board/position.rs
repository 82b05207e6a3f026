use super::error::PositionError;
use super::types::{Bitboard, CastlingRights, Color, Piece, Square};

/// Maximum number of pieces a position can hold
pub const MAX_PIECES: u32 = 32;

/// Piece placement plus the game state carried by a FEN record.
///
/// No move generation: this is the subset of a board that training
/// samples store and that feature extraction reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    pub(crate) pieces: [[Bitboard; 6]; 2],
    pub(crate) occupied: [Bitboard; 2],
    pub(crate) side_to_move: Color,
    pub(crate) castling_rights: CastlingRights,
    pub(crate) en_passant: Option<Square>,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
}

impl Position {
    /// Empty board, White to move
    #[must_use]
    pub fn empty() -> Self {
        Position {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            occupied: [Bitboard::EMPTY; 2],
            side_to_move: Color::White,
            castling_rights: CastlingRights::none(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Standard starting position
    #[must_use]
    pub fn startpos() -> Self {
        let mut position = Position::empty();
        let back_rank = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];
        for (file, piece) in back_rank.into_iter().enumerate() {
            position.put_piece(Square(0, file), Color::White, piece);
            position.put_piece(Square(1, file), Color::White, Piece::Pawn);
            position.put_piece(Square(6, file), Color::Black, Piece::Pawn);
            position.put_piece(Square(7, file), Color::Black, piece);
        }
        position.castling_rights = CastlingRights::all();
        position
    }

    /// Place a piece, replacing whatever stood on the square
    pub fn put_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        self.remove_piece(sq);
        self.pieces[color.index()][piece.index()].set(sq);
        self.occupied[color.index()].set(sq);
    }

    /// Remove and return the piece on a square
    pub fn remove_piece(&mut self, sq: Square) -> Option<(Color, Piece)> {
        let found = self.piece_at(sq)?;
        let (color, piece) = found;
        self.pieces[color.index()][piece.index()].clear(sq);
        self.occupied[color.index()].clear(sq);
        Some(found)
    }

    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        for color in Color::BOTH {
            if !self.occupied[color.index()].contains(sq) {
                continue;
            }
            for piece in Piece::ALL {
                if self.pieces[color.index()][piece.index()].contains(sq) {
                    return Some((color, piece));
                }
            }
        }
        None
    }

    /// Squares holding `piece` of `color`
    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    /// Squares holding any piece of `color`
    #[inline]
    #[must_use]
    pub fn colored(&self, color: Color) -> Bitboard {
        self.occupied[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.occupied[0] | self.occupied[1]
    }

    #[inline]
    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn set_side_to_move(&mut self, color: Color) {
        self.side_to_move = color;
    }

    #[inline]
    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    pub fn set_castling_rights(&mut self, rights: CastlingRights) {
        self.castling_rights = rights;
    }

    #[inline]
    #[must_use]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    pub fn set_en_passant(&mut self, sq: Option<Square>) {
        self.en_passant = sq;
    }

    #[inline]
    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    pub fn set_clocks(&mut self, halfmove_clock: u32, fullmove_number: u32) {
        self.halfmove_clock = halfmove_clock;
        self.fullmove_number = fullmove_number.max(1);
    }

    /// Check the placement is one a game could produce (kings, piece count, pawns).
    pub fn validate(&self) -> Result<(), PositionError> {
        for color in Color::BOTH {
            let kings = self.pieces(color, Piece::King).popcount();
            if kings != 1 {
                return Err(PositionError::KingCount {
                    color,
                    found: kings,
                });
            }
        }

        let total = self.occupied().popcount();
        if total > MAX_PIECES {
            return Err(PositionError::TooManyPieces { found: total });
        }

        let pawns = self.pieces(Color::White, Piece::Pawn) | self.pieces(Color::Black, Piece::Pawn);
        if !(pawns & (Bitboard::RANK_1 | Bitboard::RANK_8)).is_empty() {
            return Err(PositionError::PawnOnBackRank);
        }
        Ok(())
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}
