//! FEN parsing and formatting tests.

use crate::board::{CastlingRights, Color, FenError, Piece, Position, PositionError, Square};

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[test]
fn test_startpos_fen() {
    assert_eq!(Position::startpos().to_fen(), STARTPOS);
    assert_eq!(Position::try_from_fen(STARTPOS).unwrap(), Position::startpos());
}

#[test]
fn test_fen_full_state() {
    let fen = "r3k2r/8/8/3pP3/8/8/8/R3K2R w Kq d6 12 40";
    let position = Position::try_from_fen(fen).unwrap();
    assert_eq!(position.side_to_move(), Color::White);
    assert_eq!(position.en_passant(), Some("d6".parse::<Square>().unwrap()));
    assert_eq!(position.halfmove_clock(), 12);
    assert_eq!(position.fullmove_number(), 40);

    let mut rights = CastlingRights::none();
    rights.set(Color::White, true);
    rights.set(Color::Black, false);
    assert_eq!(position.castling_rights(), rights);
    assert_eq!(position.to_fen(), fen);
}

#[test]
fn test_fen_counters_optional() {
    let position = Position::try_from_fen("4k3/8/8/8/8/8/8/4K3 b - -").unwrap();
    assert_eq!(position.side_to_move(), Color::Black);
    assert_eq!(position.halfmove_clock(), 0);
    assert_eq!(position.fullmove_number(), 1);
}

#[test]
fn test_fen_errors() {
    assert_eq!(
        Position::try_from_fen("8/8/8/8 w"),
        Err(FenError::TooFewParts { found: 2 })
    );
    assert_eq!(
        Position::try_from_fen("4k3/8/8/8/8/8/8/4X3 w - - 0 1"),
        Err(FenError::InvalidPiece { char: 'X' })
    );
    assert!(matches!(
        Position::try_from_fen("4k3/8/8/8/8/8/8/4K3 x - - 0 1"),
        Err(FenError::InvalidSideToMove { .. })
    ));
    assert!(matches!(
        Position::try_from_fen("4k3/8/8/8/8/8/8/4K3 w - z9 0 1"),
        Err(FenError::InvalidEnPassant { .. })
    ));
    assert!(matches!(
        Position::try_from_fen("4k3/8/8/8/8/8/8/4K3 w - - x 1"),
        Err(FenError::InvalidCounter { .. })
    ));
    assert!(matches!(
        Position::try_from_fen("4k3/8/8/8/8/8/8/4K3R4 w - - 0 1"),
        Err(FenError::TooManyFiles { .. })
    ));
}

#[test]
fn test_fen_rejects_invalid_placement() {
    assert_eq!(
        Position::try_from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1"),
        Err(FenError::InvalidPosition(PositionError::KingCount {
            color: Color::Black,
            found: 0
        }))
    );
    assert_eq!(
        Position::try_from_fen("P3k3/8/8/8/8/8/8/4K3 w - - 0 1"),
        Err(FenError::InvalidPosition(PositionError::PawnOnBackRank))
    );
}

#[test]
fn test_fen_piece_placement() {
    let position = Position::try_from_fen("4k3/8/8/8/2q5/8/8/4K2R w K - 0 1").unwrap();
    assert_eq!(
        position.piece_at("c4".parse().unwrap()),
        Some((Color::Black, Piece::Queen))
    );
    assert_eq!(
        position.piece_at("h1".parse().unwrap()),
        Some((Color::White, Piece::Rook))
    );
    assert_eq!(position.occupied().popcount(), 4);
}
