//! Error types for board parsing and validation.

use std::fmt;

use super::types::Color;

/// Error type for FEN parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// FEN string has too few parts (needs at least 4)
    TooFewParts { found: usize },
    /// Invalid piece character in position string
    InvalidPiece { char: char },
    /// Invalid castling character
    InvalidCastling { char: char },
    /// Invalid side to move (must be 'w' or 'b')
    InvalidSideToMove { found: String },
    /// Invalid en passant square
    InvalidEnPassant { found: String },
    /// Invalid rank in position string
    InvalidRank { rank: usize },
    /// Too many files in a rank
    TooManyFiles { rank: usize, files: usize },
    /// Halfmove clock or fullmove number is not a number
    InvalidCounter { found: String },
    /// Placement parsed but describes an impossible position
    InvalidPosition(PositionError),
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::TooFewParts { found } => {
                write!(f, "FEN must have at least 4 parts, found {found}")
            }
            FenError::InvalidPiece { char } => {
                write!(f, "Invalid piece character '{char}' in FEN")
            }
            FenError::InvalidCastling { char } => {
                write!(f, "Invalid castling character '{char}' in FEN")
            }
            FenError::InvalidSideToMove { found } => {
                write!(f, "Invalid side to move '{found}', expected 'w' or 'b'")
            }
            FenError::InvalidEnPassant { found } => {
                write!(f, "Invalid en passant square '{found}'")
            }
            FenError::InvalidRank { rank } => {
                write!(f, "Invalid rank index {rank} in FEN")
            }
            FenError::TooManyFiles { rank, files } => {
                write!(f, "Too many files ({files}) in rank {rank}")
            }
            FenError::InvalidCounter { found } => {
                write!(f, "Invalid move counter '{found}' in FEN")
            }
            FenError::InvalidPosition(err) => write!(f, "Invalid position: {err}"),
        }
    }
}

impl std::error::Error for FenError {}

impl From<PositionError> for FenError {
    fn from(err: PositionError) -> Self {
        FenError::InvalidPosition(err)
    }
}

/// Error type for square parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SquareError {
    /// Rank out of bounds (must be 0-7)
    RankOutOfBounds { rank: usize },
    /// File out of bounds (must be 0-7)
    FileOutOfBounds { file: usize },
    /// Invalid algebraic notation
    InvalidNotation { notation: String },
}

impl fmt::Display for SquareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SquareError::RankOutOfBounds { rank } => {
                write!(f, "Rank {rank} out of bounds (must be 0-7)")
            }
            SquareError::FileOutOfBounds { file } => {
                write!(f, "File {file} out of bounds (must be 0-7)")
            }
            SquareError::InvalidNotation { notation } => {
                write!(f, "Invalid square notation '{notation}'")
            }
        }
    }
}

impl std::error::Error for SquareError {}

/// Structural problems with a piece placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionError {
    /// A side has no king or more than one
    KingCount { color: Color, found: u32 },
    /// More pieces than a legal game can have
    TooManyPieces { found: u32 },
    /// Pawn placed on the first or last rank
    PawnOnBackRank,
}

impl fmt::Display for PositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionError::KingCount { color, found } => {
                write!(f, "{color} must have exactly one king, found {found}")
            }
            PositionError::TooManyPieces { found } => {
                write!(f, "Position has {found} pieces, at most 32 allowed")
            }
            PositionError::PawnOnBackRank => write!(f, "Pawn on first or last rank"),
        }
    }
}

impl std::error::Error for PositionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fen_error_too_few_parts() {
        let err = FenError::TooFewParts { found: 2 };
        assert!(err.to_string().contains('2'));
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_fen_error_invalid_piece() {
        let err = FenError::InvalidPiece { char: 'z' };
        assert!(err.to_string().contains("'z'"));
    }

    #[test]
    fn test_fen_error_wraps_position_error() {
        let err: FenError = PositionError::TooManyPieces { found: 33 }.into();
        assert!(err.to_string().contains("33"));
    }

    #[test]
    fn test_square_error_invalid_notation() {
        let err = SquareError::InvalidNotation {
            notation: "xyz".to_string(),
        };
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn test_king_count_message() {
        let err = PositionError::KingCount {
            color: Color::Black,
            found: 0,
        };
        assert_eq!(err.to_string(), "Black must have exactly one king, found 0");
    }
}
