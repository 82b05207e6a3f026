//! Training samples and their packed 32-byte on-disk record.
//!
//! Record layout (little-endian):
//!
//! | Bytes | Field |
//! |---|---|
//! | 0..16 | 4-bit piece codes, one per occupied square in ascending order |
//! | 16..24 | occupancy bitboard |
//! | 24..26 | eval (i16, `i16::MIN` = none) |
//! | 26..28 | fullmove number |
//! | 28 | halfmove clock, saturated at 255 |
//! | 29 | en passant square (0 = none) |
//! | 30 | side to move (0 white, 1 black) |
//! | 31 | outcome (`0b11` draw, `0b10` white wins, `0b01` black wins) |
//!
//! A piece code has the colour in bit 3 (set for white) and the piece in the
//! low three bits (`piece + 1`, or 7 for a rook that still carries a castling
//! right). Castling rights are therefore recovered from the rooks: a castling
//! rook seen before its king is the queen-side rook, one seen after is the
//! king-side rook.

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::board::{
    Bitboard, CastlingRights, Color, Piece, Position, PositionError, Square, MAX_PIECES,
};

/// Size of a packed record in bytes
pub const PACKED_SAMPLE_SIZE: usize = 32;

const NO_EVAL: i16 = i16::MIN;
const WHITE_BIT: u8 = 0b1000;
const PIECE_MASK: u8 = 0b0111;
const CASTLING_ROOK: u8 = 0b0111;

/// Result of the game a sample was taken from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

impl Outcome {
    #[must_use]
    pub const fn winner(self) -> Option<Color> {
        match self {
            Outcome::WhiteWins => Some(Color::White),
            Outcome::BlackWins => Some(Color::Black),
            Outcome::Draw => None,
        }
    }

    /// 1.0 for a win, 0.5 for a draw, 0.0 for a loss, from `color`'s side
    #[inline]
    #[must_use]
    pub fn score_for(self, color: Color) -> f32 {
        match self.winner() {
            Some(winner) if winner == color => 1.0,
            Some(_) => 0.0,
            None => 0.5,
        }
    }

    const fn to_bits(self) -> u8 {
        match self {
            Outcome::Draw => 0b11,
            Outcome::WhiteWins => 0b10,
            Outcome::BlackWins => 0b01,
        }
    }

    const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b11 => Some(Outcome::Draw),
            0b10 => Some(Outcome::WhiteWins),
            0b01 => Some(Outcome::BlackWins),
            _ => None,
        }
    }
}

/// One training position with its labels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sample {
    pub position: Position,
    pub outcome: Outcome,
    /// Engine evaluation in centipawns, side to move relative
    pub eval: Option<i16>,
}

impl Sample {
    #[must_use]
    pub fn new(position: Position, outcome: Outcome, eval: Option<i16>) -> Self {
        Sample {
            position,
            outcome,
            eval,
        }
    }

    /// Game result from the side to move's point of view
    #[inline]
    #[must_use]
    pub fn outcome_target(&self) -> f32 {
        self.outcome.score_for(self.position.side_to_move())
    }

    /// Stored evaluation, or an infinite/zero stand-in taken from the outcome
    #[inline]
    #[must_use]
    pub fn eval_target(&self) -> f32 {
        match self.eval {
            Some(eval) => f32::from(eval),
            None => match self.outcome.winner() {
                Some(winner) if winner == self.position.side_to_move() => f32::INFINITY,
                Some(_) => f32::NEG_INFINITY,
                None => 0.0,
            },
        }
    }

    pub fn pack(&self) -> Result<PackedSample, PackError> {
        PackedSample::new(self)
    }
}

/// Error type for packing failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackError {
    TooManyPieces { found: u32 },
    /// `i16::MIN` marks a missing evaluation and cannot be stored
    ReservedEval,
}

impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackError::TooManyPieces { found } => {
                write!(f, "Cannot pack {found} pieces, at most 32 allowed")
            }
            PackError::ReservedEval => write!(f, "Eval {} is reserved for 'no eval'", NO_EVAL),
        }
    }
}

impl std::error::Error for PackError {}

/// Error type for unpacking failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackError {
    InvalidPosition(PositionError),
    InvalidOutcome { bits: u8 },
    InvalidSideToMove { value: u8 },
    InvalidEnPassant { value: u8 },
    InvalidPieceCode { code: u8 },
    TooManyPieces { found: u32 },
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnpackError::InvalidPosition(err) => write!(f, "Invalid position: {err}"),
            UnpackError::InvalidOutcome { bits } => write!(f, "Invalid outcome field {bits:#04b}"),
            UnpackError::InvalidSideToMove { value } => {
                write!(f, "Invalid side to move field {value}")
            }
            UnpackError::InvalidEnPassant { value } => {
                write!(f, "Invalid en passant field {value}")
            }
            UnpackError::InvalidPieceCode { code } => write!(f, "Invalid piece code {code:#06b}"),
            UnpackError::TooManyPieces { found } => {
                write!(f, "Occupancy has {found} squares, at most 32 allowed")
            }
        }
    }
}

impl std::error::Error for UnpackError {}

impl From<PositionError> for UnpackError {
    fn from(err: PositionError) -> Self {
        UnpackError::InvalidPosition(err)
    }
}

/// 32-byte packed training record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackedSample {
    pieces: [u8; 16],
    occupied: u64,
    eval: i16,
    fullmove_number: u16,
    halfmove_clock: u8,
    en_passant: u8,
    side_to_move: u8,
    outcome: u8,
}

impl PackedSample {
    fn new(sample: &Sample) -> Result<Self, PackError> {
        let position = &sample.position;
        let occupied = position.occupied();
        let count = occupied.popcount();
        if count > MAX_PIECES {
            return Err(PackError::TooManyPieces { found: count });
        }
        if sample.eval == Some(NO_EVAL) {
            return Err(PackError::ReservedEval);
        }

        let mut pieces = [0u8; 16];
        for (n, sq) in occupied.iter().enumerate() {
            let Some((color, piece)) = position.piece_at(sq) else {
                continue;
            };
            let code = if is_castling_rook(position, sq, color, piece) {
                CASTLING_ROOK
            } else {
                piece.index() as u8 + 1
            };
            let bits = code | if color == Color::White { WHITE_BIT } else { 0 };
            pieces[n / 2] |= if n % 2 == 0 { bits } else { bits << 4 };
        }

        Ok(PackedSample {
            pieces,
            occupied: occupied.0,
            eval: sample.eval.unwrap_or(NO_EVAL),
            fullmove_number: position.fullmove_number().min(u32::from(u16::MAX)) as u16,
            halfmove_clock: position.halfmove_clock().min(255) as u8,
            en_passant: position.en_passant().map_or(0, |sq| sq.index() as u8),
            side_to_move: position.side_to_move().index() as u8,
            outcome: sample.outcome.to_bits(),
        })
    }

    pub fn unpack(&self) -> Result<Sample, UnpackError> {
        let mut position = Position::empty();

        let side_to_move = Color::from_index(usize::from(self.side_to_move)).ok_or(
            UnpackError::InvalidSideToMove {
                value: self.side_to_move,
            },
        )?;
        position.set_side_to_move(side_to_move);

        if self.en_passant != 0 {
            let sq = Square::from_index(usize::from(self.en_passant)).ok_or(
                UnpackError::InvalidEnPassant {
                    value: self.en_passant,
                },
            )?;
            position.set_en_passant(Some(sq));
        }
        position.set_clocks(
            u32::from(self.halfmove_clock),
            u32::from(self.fullmove_number),
        );

        let occupied = Bitboard(self.occupied);
        let count = occupied.popcount();
        if count > MAX_PIECES {
            return Err(UnpackError::TooManyPieces { found: count });
        }

        let mut castling = CastlingRights::none();
        let mut saw_king = [false; 2];
        for (n, sq) in occupied.iter().enumerate() {
            let entry = self.pieces[n / 2];
            let code = if n % 2 == 0 { entry & 0xf } else { entry >> 4 };
            let color = if code & WHITE_BIT != 0 {
                Color::White
            } else {
                Color::Black
            };
            let piece = match code & PIECE_MASK {
                CASTLING_ROOK => {
                    castling.set(color, saw_king[color.index()]);
                    Piece::Rook
                }
                0 => return Err(UnpackError::InvalidPieceCode { code }),
                bits => Piece::from_index(usize::from(bits - 1))
                    .ok_or(UnpackError::InvalidPieceCode { code })?,
            };
            if piece == Piece::King {
                saw_king[color.index()] = true;
            }
            position.put_piece(sq, color, piece);
        }
        position.set_castling_rights(castling);
        position.validate()?;

        let outcome = Outcome::from_bits(self.outcome)
            .ok_or(UnpackError::InvalidOutcome { bits: self.outcome })?;
        let eval = match self.eval {
            NO_EVAL => None,
            eval => Some(eval),
        };

        Ok(Sample {
            position,
            outcome,
            eval,
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; PACKED_SAMPLE_SIZE] {
        let mut bytes = [0u8; PACKED_SAMPLE_SIZE];
        bytes[..16].copy_from_slice(&self.pieces);
        LittleEndian::write_u64(&mut bytes[16..24], self.occupied);
        LittleEndian::write_i16(&mut bytes[24..26], self.eval);
        LittleEndian::write_u16(&mut bytes[26..28], self.fullmove_number);
        bytes[28] = self.halfmove_clock;
        bytes[29] = self.en_passant;
        bytes[30] = self.side_to_move;
        bytes[31] = self.outcome;
        bytes
    }

    #[must_use]
    pub fn from_bytes(bytes: &[u8; PACKED_SAMPLE_SIZE]) -> Self {
        let mut pieces = [0u8; 16];
        pieces.copy_from_slice(&bytes[..16]);
        PackedSample {
            pieces,
            occupied: LittleEndian::read_u64(&bytes[16..24]),
            eval: LittleEndian::read_i16(&bytes[24..26]),
            fullmove_number: LittleEndian::read_u16(&bytes[26..28]),
            halfmove_clock: bytes[28],
            en_passant: bytes[29],
            side_to_move: bytes[30],
            outcome: bytes[31],
        }
    }
}

/// Rook on its back-rank corner whose side still has the matching right
fn is_castling_rook(position: &Position, sq: Square, color: Color, piece: Piece) -> bool {
    if piece != Piece::Rook || sq.rank() != color.back_rank() {
        return false;
    }
    let rights = position.castling_rights();
    match sq.file() {
        0 => rights.has(color, false),
        7 => rights.has(color, true),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(fen: &str, outcome: Outcome, eval: Option<i16>) -> Sample {
        Sample::new(Position::try_from_fen(fen).unwrap(), outcome, eval)
    }

    fn roundtrip(sample: &Sample) -> Sample {
        let bytes = sample.pack().unwrap().to_bytes();
        PackedSample::from_bytes(&bytes).unpack().unwrap()
    }

    #[test]
    fn startpos_roundtrip() {
        let draw = Sample::new(Position::startpos(), Outcome::Draw, None);
        assert_eq!(roundtrip(&draw), draw);

        let win = Sample::new(Position::startpos(), Outcome::WhiteWins, Some(-202));
        assert_eq!(roundtrip(&win), win);
    }

    #[test]
    fn partial_castling_and_en_passant_roundtrip() {
        let s = sample(
            "r3k2r/pp3ppp/8/3pP3/8/8/PPP2PPP/R3K2R w Kq d6 3 17",
            Outcome::BlackWins,
            Some(35),
        );
        assert_eq!(roundtrip(&s), s);

        let s = sample("4k3/8/8/8/8/8/8/R3K2R b - - 0 60", Outcome::Draw, Some(0));
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn record_layout() {
        let s = sample("4k3/8/8/8/8/8/8/4K2R w K - 7 300", Outcome::WhiteWins, Some(-5));
        let bytes = s.pack().unwrap().to_bytes();
        // e1 king (white, code 6) then h1 castling rook (white, 7), e8 king (black, 6)
        assert_eq!(bytes[0], 0xfe);
        assert_eq!(bytes[1], 0x06);
        let occupied = (1u64 << 4) | (1u64 << 7) | (1u64 << 60);
        assert_eq!(&bytes[16..24], &occupied.to_le_bytes());
        assert_eq!(&bytes[24..26], &(-5i16).to_le_bytes());
        assert_eq!(&bytes[26..28], &300u16.to_le_bytes());
        assert_eq!(bytes[28], 7);
        assert_eq!(bytes[29], 0);
        assert_eq!(bytes[30], 0);
        assert_eq!(bytes[31], 0b10);
    }

    #[test]
    fn halfmove_saturates() {
        let mut position = Position::startpos();
        position.set_clocks(1000, 1);
        let packed = Sample::new(position, Outcome::Draw, None).pack().unwrap();
        assert_eq!(packed.to_bytes()[28], 255);
    }

    #[test]
    fn targets_follow_side_to_move() {
        let white = sample("4k3/8/8/8/8/8/8/4K3 w - - 0 1", Outcome::WhiteWins, None);
        assert_eq!(white.outcome_target(), 1.0);
        assert_eq!(white.eval_target(), f32::INFINITY);

        let black = sample("4k3/8/8/8/8/8/8/4K3 b - - 0 1", Outcome::WhiteWins, None);
        assert_eq!(black.outcome_target(), 0.0);
        assert_eq!(black.eval_target(), f32::NEG_INFINITY);

        let draw = sample("4k3/8/8/8/8/8/8/4K3 b - - 0 1", Outcome::Draw, Some(12));
        assert_eq!(draw.outcome_target(), 0.5);
        assert_eq!(draw.eval_target(), 12.0);

        let undecided = sample("4k3/8/8/8/8/8/8/4K3 b - - 0 1", Outcome::Draw, None);
        assert_eq!(undecided.eval_target(), 0.0);
    }

    #[test]
    fn unpack_errors() {
        let good = Sample::new(Position::startpos(), Outcome::Draw, None)
            .pack()
            .unwrap()
            .to_bytes();

        let mut bytes = good;
        bytes[31] = 0;
        assert_eq!(
            PackedSample::from_bytes(&bytes).unpack(),
            Err(UnpackError::InvalidOutcome { bits: 0 })
        );

        let mut bytes = good;
        bytes[30] = 2;
        assert_eq!(
            PackedSample::from_bytes(&bytes).unpack(),
            Err(UnpackError::InvalidSideToMove { value: 2 })
        );

        let mut bytes = good;
        bytes[29] = 64;
        assert_eq!(
            PackedSample::from_bytes(&bytes).unpack(),
            Err(UnpackError::InvalidEnPassant { value: 64 })
        );

        let mut bytes = good;
        bytes[16..24].copy_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(
            PackedSample::from_bytes(&bytes).unpack(),
            Err(UnpackError::TooManyPieces { found: 64 })
        );

        // All-zero record: no pieces, so no kings
        assert!(matches!(
            PackedSample::default().unpack(),
            Err(UnpackError::InvalidPosition(PositionError::KingCount { .. }))
        ));
    }

    #[test]
    fn pack_errors() {
        let s = Sample::new(Position::startpos(), Outcome::Draw, Some(i16::MIN));
        assert_eq!(s.pack(), Err(PackError::ReservedEval));
    }
}
