use std::str::FromStr;

use super::error::FenError;
use super::position::Position;
use super::types::{CastlingRights, Color, Piece, Square};

impl Position {
    /// Parse a position from FEN notation.
    ///
    /// The halfmove clock and fullmove number are optional and default to 0 and 1.
    /// The placement must pass [`Position::validate`].
    pub fn try_from_fen(fen: &str) -> Result<Self, FenError> {
        let mut position = Position::empty();
        let parts: Vec<&str> = fen.split_whitespace().collect();

        if parts.len() < 4 {
            return Err(FenError::TooFewParts { found: parts.len() });
        }

        // Parse piece placement
        for (rank_idx, rank_str) in parts[0].split('/').enumerate() {
            if rank_idx >= 8 {
                return Err(FenError::InvalidRank { rank: rank_idx });
            }
            let mut file = 0;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                    continue;
                }
                let color = if c.is_uppercase() {
                    Color::White
                } else {
                    Color::Black
                };
                let piece = Piece::from_char(c).ok_or(FenError::InvalidPiece { char: c })?;
                if file >= 8 {
                    return Err(FenError::TooManyFiles {
                        rank: rank_idx,
                        files: file + 1,
                    });
                }
                position.put_piece(Square(7 - rank_idx, file), color, piece);
                file += 1;
            }
            if file > 8 {
                return Err(FenError::TooManyFiles {
                    rank: rank_idx,
                    files: file,
                });
            }
        }

        // Parse side to move
        position.side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(FenError::InvalidSideToMove {
                    found: other.to_string(),
                })
            }
        };

        // Parse castling rights
        let mut castling = CastlingRights::none();
        for c in parts[2].chars() {
            match c {
                'K' => castling.set(Color::White, true),
                'Q' => castling.set(Color::White, false),
                'k' => castling.set(Color::Black, true),
                'q' => castling.set(Color::Black, false),
                '-' => {}
                _ => return Err(FenError::InvalidCastling { char: c }),
            }
        }
        position.castling_rights = castling;

        // Parse en passant target
        position.en_passant = if parts[3] == "-" {
            None
        } else {
            let sq = Square::from_str(parts[3]).map_err(|_| FenError::InvalidEnPassant {
                found: parts[3].to_string(),
            })?;
            Some(sq)
        };

        let counter = |s: &str| {
            s.parse::<u32>().map_err(|_| FenError::InvalidCounter {
                found: s.to_string(),
            })
        };
        let halfmove_clock = parts.get(4).map(|s| counter(s)).transpose()?.unwrap_or(0);
        let fullmove_number = parts.get(5).map(|s| counter(s)).transpose()?.unwrap_or(1);
        position.set_clocks(halfmove_clock, fullmove_number);

        position.validate()?;
        Ok(position)
    }

    /// Convert the position to FEN notation.
    #[must_use]
    pub fn to_fen(&self) -> String {
        let mut rows: Vec<String> = Vec::with_capacity(8);
        for rank in (0..8).rev() {
            let mut row = String::new();
            let mut empty = 0;
            for file in 0..8 {
                match self.piece_at(Square(rank, file)) {
                    Some((color, piece)) => {
                        if empty > 0 {
                            row.push_str(&empty.to_string());
                            empty = 0;
                        }
                        row.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                row.push_str(&empty.to_string());
            }
            rows.push(row);
        }

        let side = match self.side_to_move {
            Color::White => "w",
            Color::Black => "b",
        };
        let en_passant = self
            .en_passant
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {} {} {} {} {}",
            rows.join("/"),
            side,
            self.castling_rights.to_fen(),
            en_passant,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::try_from_fen(s)
    }
}
