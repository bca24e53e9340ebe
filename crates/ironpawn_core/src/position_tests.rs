use super::*;
use crate::movegen::{generate_moves, legal_moves};
use crate::moves::MoveList;
use rand::seq::SliceRandom;
use rand::SeedableRng;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

/// Field-by-field equality, ignoring the history stack.
fn assert_positions_match(a: &Position, b: &Position) {
    assert_eq!(a.to_fen(), b.to_fen());
    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.occupancy(), b.occupancy());
    for color in [Color::White, Color::Black] {
        assert_eq!(a.side_occupancy(color), b.side_occupancy(color));
        for kind in [
            PieceKind::Pawn,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Rook,
            PieceKind::Queen,
            PieceKind::King,
        ] {
            assert_eq!(a.pieces(color, kind), b.pieces(color, kind));
        }
    }
}

#[test]
fn test_startpos() {
    let pos = Position::startpos();
    assert_eq!(pos.side_to_move(), Color::White);
    assert_eq!(pos.castling(), CastlingRights::ALL);
    assert_eq!(pos.en_passant(), None);
    assert_eq!(pos.halfmove_clock(), 0);
    assert_eq!(pos.fullmove_number(), 1);
    assert_eq!(pos.occupancy().popcount(), 32);
    assert_eq!(pos.hash(), pos.compute_hash());
    assert_eq!(
        pos.piece_at(4),
        Some(Piece::new(Color::White, PieceKind::King))
    );
    assert_eq!(
        pos.piece_at(63),
        Some(Piece::new(Color::Black, PieceKind::Rook))
    );
    assert_eq!(pos.piece_at(27), None);
    assert_eq!(pos.king_sq(Color::Black), Some(60));
}

#[test]
fn test_fen_roundtrip() {
    for fen in [
        START_FEN,
        KIWIPETE,
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        "8/8/8/2pP4/8/8/8/8 w - c6 0 1",
        "4k3/8/8/8/8/8/8/4K3 b - - 42 99",
    ] {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }
}

#[test]
fn test_fen_optional_counters_default() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq -").unwrap();
    assert_eq!(pos.halfmove_clock(), 0);
    assert_eq!(pos.fullmove_number(), 1);
}

#[test]
fn test_fen_errors() {
    assert_eq!(Position::from_fen("").unwrap_err(), FenError::MissingFields);
    assert_eq!(
        Position::from_fen("8/8/8/8 w - -").unwrap_err(),
        FenError::BadBoardShape
    );
    assert_eq!(
        Position::from_fen("8/8/8/8/8/8/8/7x w - -").unwrap_err(),
        FenError::InvalidPiece('x')
    );
    assert_eq!(
        Position::from_fen("8/8/8/8/8/8/8/9 w - -").unwrap_err(),
        FenError::BadBoardShape
    );
    assert_eq!(
        Position::from_fen("8/8/8/8/8/8/8/8 x - -").unwrap_err(),
        FenError::InvalidSideToMove("x".to_string())
    );
    assert_eq!(
        Position::from_fen("8/8/8/8/8/8/8/8 w X -").unwrap_err(),
        FenError::InvalidCastling('X')
    );
    assert_eq!(
        Position::from_fen("8/8/8/8/8/8/8/8 w - e9").unwrap_err(),
        FenError::InvalidEnPassant("e9".to_string())
    );
    assert_eq!(
        Position::from_fen("8/8/8/8/8/8/8/8 w - - ten").unwrap_err(),
        FenError::InvalidCounter("ten".to_string())
    );
}

#[test]
fn test_do_undo_restores_every_move() {
    let tables = AttackTables::get();
    let original = Position::from_fen(KIWIPETE).unwrap();
    let mut pos = original.clone();

    let mut list = MoveList::new();
    generate_moves(&pos, tables, true, &mut list);
    assert!(!list.is_empty());

    for mv in list.iter() {
        if pos.do_move(mv, tables) {
            pos.undo_move();
        }
        // Whether the move was played-and-undone or rejected outright,
        // nothing may have leaked.
        assert_positions_match(&pos, &original);
        assert_eq!(pos.hash(), pos.compute_hash());
    }
}

#[test]
fn test_random_walk_keeps_hash_consistent() {
    let tables = AttackTables::get();
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let original = Position::startpos();
    let mut pos = original.clone();

    let mut played = 0;
    for _ in 0..120 {
        let moves = legal_moves(&pos, tables);
        let Some(&mv) = moves.choose(&mut rng) else {
            break;
        };
        assert!(pos.do_move(mv, tables));
        played += 1;
        assert_eq!(pos.hash(), pos.compute_hash(), "hash drifted after {mv}");
    }

    for _ in 0..played {
        pos.undo_move();
        assert_eq!(pos.hash(), pos.compute_hash());
    }
    assert_positions_match(&pos, &original);
}

#[test]
fn test_do_move_rejects_exposing_own_king() {
    let tables = AttackTables::get();
    // The e2 bishop is pinned by the e4 rook.
    let original = Position::from_fen("4k3/8/8/8/4r3/8/4B3/4K3 w - - 0 1").unwrap();
    let mut pos = original.clone();

    let mut list = MoveList::new();
    generate_moves(&pos, tables, true, &mut list);
    let bishop_moves: Vec<Move> = list.iter().filter(|m| m.from() == 12).collect();
    assert!(!bishop_moves.is_empty(), "pseudo-legal list still contains pinned-piece moves");

    for mv in bishop_moves {
        assert!(!pos.do_move(mv, tables), "{mv} exposes the king and must fail");
        assert_positions_match(&pos, &original);
    }
}

#[test]
fn test_en_passant_capture_scenario() {
    let tables = AttackTables::get();
    let mut pos = Position::from_fen("8/8/8/2pP4/8/8/8/8 w - c6 0 1").unwrap();

    let mut list = MoveList::new();
    generate_moves(&pos, tables, true, &mut list);
    let ep = list
        .iter()
        .find(|m| m.from() == 35 && m.to() == 42)
        .expect("d5xc6 en passant must be generated");
    assert!(ep.is_en_passant());

    assert!(pos.do_move(ep, tables));
    assert_eq!(pos.piece_at(34), None, "the c5 pawn is gone");
    assert_eq!(
        pos.piece_at(42),
        Some(Piece::new(Color::White, PieceKind::Pawn)),
        "the capturing pawn stands on c6"
    );
    assert_eq!(pos.piece_at(35), None);

    pos.undo_move();
    assert_eq!(pos.to_fen(), "8/8/8/2pP4/8/8/8/8 w - c6 0 1");
}

#[test]
fn test_double_push_opens_en_passant_target() {
    let tables = AttackTables::get();
    let mut pos = Position::startpos();
    let mv = crate::uci::parse_uci_move(&pos, tables, "e2e4").unwrap();
    assert!(pos.do_move(mv, tables));
    assert_eq!(pos.en_passant(), Some(20)); // e3
    assert_eq!(pos.hash(), pos.compute_hash());

    // Any reply clears it again.
    let reply = crate::uci::parse_uci_move(&pos, tables, "g8f6").unwrap();
    assert!(pos.do_move(reply, tables));
    assert_eq!(pos.en_passant(), None);
}

#[test]
fn test_castling_updates_both_pieces() {
    let tables = AttackTables::get();
    let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let mv = crate::uci::parse_uci_move(&pos, tables, "e1g1").unwrap();

    assert!(pos.do_move(mv, tables));
    assert_eq!(pos.piece_at(6), Some(Piece::new(Color::White, PieceKind::King)));
    assert_eq!(pos.piece_at(5), Some(Piece::new(Color::White, PieceKind::Rook)));
    assert_eq!(pos.piece_at(4), None);
    assert_eq!(pos.piece_at(7), None);
    assert!(!pos.castling().has(CastlingRights::WHITE_KING_SIDE));
    assert!(!pos.castling().has(CastlingRights::WHITE_QUEEN_SIDE));
    assert!(pos.castling().has(CastlingRights::BLACK_KING_SIDE));
    assert_eq!(pos.hash(), pos.compute_hash());

    pos.undo_move();
    assert_eq!(pos.to_fen(), "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
}

#[test]
fn test_rook_moves_revoke_rights_immediately() {
    let tables = AttackTables::get();
    let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();

    let mv = crate::uci::parse_uci_move(&pos, tables, "a1a2").unwrap();
    assert!(pos.do_move(mv, tables));
    assert!(!pos.castling().has(CastlingRights::WHITE_QUEEN_SIDE));
    assert!(pos.castling().has(CastlingRights::WHITE_KING_SIDE));
}

#[test]
fn test_capturing_a_home_rook_revokes_its_right() {
    let tables = AttackTables::get();
    // White rook takes the h8 rook.
    let mut pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let mv = crate::uci::parse_uci_move(&pos, tables, "h1h8").unwrap();
    assert!(pos.do_move(mv, tables));
    assert!(!pos.castling().has(CastlingRights::BLACK_KING_SIDE));
    assert!(pos.castling().has(CastlingRights::BLACK_QUEEN_SIDE));
    assert_eq!(pos.hash(), pos.compute_hash());
}

#[test]
fn test_promotion_and_undo() {
    let tables = AttackTables::get();
    let mut pos = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();

    let mut list = MoveList::new();
    generate_moves(&pos, tables, true, &mut list);
    let promo = list
        .iter()
        .find(|m| m.promoted_kind() == Some(PieceKind::Queen))
        .expect("queen promotion must be generated");

    assert!(pos.do_move(promo, tables));
    assert_eq!(
        pos.piece_at(56),
        Some(Piece::new(Color::White, PieceKind::Queen))
    );
    assert!(pos.pieces(Color::White, PieceKind::Pawn).is_empty());
    assert_eq!(pos.hash(), pos.compute_hash());

    pos.undo_move();
    assert_eq!(
        pos.piece_at(48),
        Some(Piece::new(Color::White, PieceKind::Pawn))
    );
    assert_eq!(pos.piece_at(56), None);
}

#[test]
fn test_halfmove_clock_bookkeeping() {
    let tables = AttackTables::get();
    let mut pos = Position::from_fen("4k3/8/8/8/8/8/4P3/4K1N1 w - - 12 40").unwrap();

    // A knight move ticks the clock up.
    let mv = crate::uci::parse_uci_move(&pos, tables, "g1f3").unwrap();
    assert!(pos.do_move(mv, tables));
    assert_eq!(pos.halfmove_clock(), 13);
    pos.undo_move();

    // A pawn move resets it.
    let mv = crate::uci::parse_uci_move(&pos, tables, "e2e3").unwrap();
    assert!(pos.do_move(mv, tables));
    assert_eq!(pos.halfmove_clock(), 0);
}

#[test]
fn test_repetition_detection() {
    let tables = AttackTables::get();
    let mut pos = Position::startpos();

    for text in ["g1f3", "g8f6", "f3g1", "f6g8"] {
        let mv = crate::uci::parse_uci_move(&pos, tables, text).unwrap();
        assert!(pos.do_move(mv, tables));
    }
    // Back to the starting position: the start-of-game hash repeats.
    assert!(pos.is_repetition());

    // A pawn push makes the position fresh again.
    let mv = crate::uci::parse_uci_move(&pos, tables, "e2e4").unwrap();
    assert!(pos.do_move(mv, tables));
    assert!(!pos.is_repetition());
}

#[test]
fn test_fifty_move_rule() {
    let pos = Position::from_fen("8/8/8/4k3/8/4K3/8/8 w - - 100 60").unwrap();
    assert!(pos.is_fifty_move_draw());
    let pos = Position::from_fen("8/8/8/4k3/8/4K3/8/8 w - - 99 60").unwrap();
    assert!(!pos.is_fifty_move_draw());
}

#[test]
fn test_insufficient_material() {
    for (fen, expected) in [
        ("8/8/8/4k3/8/4K3/8/8 w - - 0 1", true),           // K vs K
        ("8/8/8/4k3/8/2B1K3/8/8 w - - 0 1", true),         // KB vs K
        ("8/8/8/4k3/8/2N1K3/8/8 w - - 0 1", true),         // KN vs K
        ("8/8/8/4k3/8/1NN1K3/8/8 w - - 0 1", true),        // KNN vs K
        ("8/8/8/4k3/8/2R1K3/8/8 w - - 0 1", false),        // KR vs K
        ("8/8/8/4k3/8/2Q1K3/8/8 w - - 0 1", false),        // KQ vs K
        ("8/8/8/4k3/8/2P1K3/8/8 w - - 0 1", false),        // KP vs K
        ("8/8/8/2b1k3/8/2B1K3/8/8 w - - 0 1", true),       // KB vs KB
        ("8/8/8/4k3/8/1BB1K3/8/8 w - - 0 1", false),       // KBB vs K
    ] {
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.is_insufficient_material(), expected, "{fen}");
    }
}

#[test]
fn test_ply_tracks_search_depth() {
    let tables = AttackTables::get();
    let mut pos = Position::startpos();
    assert_eq!(pos.ply(), 0);

    let mv = crate::uci::parse_uci_move(&pos, tables, "d2d4").unwrap();
    assert!(pos.do_move(mv, tables));
    assert_eq!(pos.ply(), 1);

    pos.reset_ply();
    assert_eq!(pos.ply(), 0);
    pos.undo_move();
    assert_eq!(pos.ply(), 0);
}
