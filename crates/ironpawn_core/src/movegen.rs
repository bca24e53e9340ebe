//! Pseudo-legal move generation.
//!
//! Moves are generated without checking whether they leave the mover's
//! king attacked; `Position::do_move` rejects those when the move is
//! tried. That tradeoff keeps generation branch-light and is load-
//! bearing: search and perft both rely on do-then-reject filtering.

use crate::attacks::AttackTables;
use crate::bitboard::Bitboard;
use crate::moves::{
    mvv_lva, Move, MoveKind, MoveList, CAPTURE_SCORE_OFFSET, FLAG_DOUBLE_PUSH, FLAG_EN_PASSANT,
    FLAG_NONE, FLAG_PROMOTE_BISHOP, FLAG_PROMOTE_KNIGHT, FLAG_PROMOTE_QUEEN, FLAG_PROMOTE_ROOK,
};
use crate::position::{CastlingRights, Position};
use crate::types::{rank_of, Color, PieceKind};

const PROMOTION_FLAGS: [u8; 4] = [
    FLAG_PROMOTE_KNIGHT,
    FLAG_PROMOTE_BISHOP,
    FLAG_PROMOTE_ROOK,
    FLAG_PROMOTE_QUEEN,
];

// Squares that must be empty between king and rook.
const WHITE_KING_SIDE_GAP: Bitboard = Bitboard(0x60); // f1 g1
const WHITE_QUEEN_SIDE_GAP: Bitboard = Bitboard(0x0e); // b1 c1 d1
const BLACK_KING_SIDE_GAP: Bitboard = Bitboard(0x60 << 56); // f8 g8
const BLACK_QUEEN_SIDE_GAP: Bitboard = Bitboard(0x0e << 56); // b8 c8 d8

/// Is `sq` attacked by any piece of `by`? Answered from the target
/// square outward via attack symmetry, never by generating the
/// opponent's moves. This is the single source of truth for check and
/// castling-safety detection.
pub fn is_square_attacked(pos: &Position, sq: u8, by: Color, tables: &AttackTables) -> bool {
    use PieceKind::*;

    // A pawn of `by` attacks sq exactly from the squares a pawn of the
    // opposite color on sq would attack.
    if !(tables.pawn(by.other(), sq) & pos.pieces(by, Pawn)).is_empty() {
        return true;
    }
    if !(tables.knight(sq) & pos.pieces(by, Knight)).is_empty() {
        return true;
    }
    if !(tables.king(sq) & pos.pieces(by, King)).is_empty() {
        return true;
    }

    let occupied = pos.occupancy();
    let diagonal = pos.pieces(by, Bishop) | pos.pieces(by, Queen);
    if !(tables.bishop(sq, occupied) & diagonal).is_empty() {
        return true;
    }
    let orthogonal = pos.pieces(by, Rook) | pos.pieces(by, Queen);
    if !(tables.rook(sq, occupied) & orthogonal).is_empty() {
        return true;
    }

    false
}

/// Generate pseudo-legal moves for the side to move into `list`.
/// With `include_quiet` false only captures (including en passant and
/// capture promotions) come out; that is the quiescence set.
pub fn generate_moves(
    pos: &Position,
    tables: &AttackTables,
    include_quiet: bool,
    list: &mut MoveList,
) {
    list.clear();

    let us = pos.side_to_move();
    let own = pos.side_occupancy(us);
    let enemy = pos.side_occupancy(us.other());
    let occupied = pos.occupancy();

    for from in own {
        let Some(piece) = pos.piece_at(from) else {
            continue;
        };
        match piece.kind {
            PieceKind::Pawn => gen_pawn_moves(pos, tables, from, us, include_quiet, list),
            PieceKind::Knight => push_piece_moves(
                pos,
                from,
                PieceKind::Knight,
                tables.knight(from) & !own,
                enemy,
                include_quiet,
                list,
            ),
            PieceKind::Bishop => push_piece_moves(
                pos,
                from,
                PieceKind::Bishop,
                tables.bishop(from, occupied) & !own,
                enemy,
                include_quiet,
                list,
            ),
            PieceKind::Rook => push_piece_moves(
                pos,
                from,
                PieceKind::Rook,
                tables.rook(from, occupied) & !own,
                enemy,
                include_quiet,
                list,
            ),
            PieceKind::Queen => push_piece_moves(
                pos,
                from,
                PieceKind::Queen,
                tables.queen(from, occupied) & !own,
                enemy,
                include_quiet,
                list,
            ),
            PieceKind::King => push_piece_moves(
                pos,
                from,
                PieceKind::King,
                tables.king(from) & !own,
                enemy,
                include_quiet,
                list,
            ),
        }
    }

    if include_quiet {
        gen_castling_moves(pos, tables, list);
    }
}

/// Emit every target in `targets` as a capture or (optionally) a quiet
/// move. Captures carry their MVV-LVA score from the start.
fn push_piece_moves(
    pos: &Position,
    from: u8,
    attacker: PieceKind,
    targets: Bitboard,
    enemy: Bitboard,
    include_quiet: bool,
    list: &mut MoveList,
) {
    for to in targets {
        if enemy.contains(to) {
            let Some(victim) = pos.piece_at(to) else {
                continue;
            };
            let mut mv = Move::new(from, to, MoveKind::Capture, FLAG_NONE);
            mv.set_score(CAPTURE_SCORE_OFFSET + mvv_lva(victim.kind, attacker));
            list.push(mv);
        } else if include_quiet {
            list.push(Move::new(from, to, MoveKind::Quiet, FLAG_NONE));
        }
    }
}

fn gen_pawn_moves(
    pos: &Position,
    tables: &AttackTables,
    from: u8,
    us: Color,
    include_quiet: bool,
    list: &mut MoveList,
) {
    let enemy = pos.side_occupancy(us.other());
    // A pawn one step from the far rank promotes on any advance.
    let promoting = rank_of(from)
        == match us {
            Color::White => 6,
            Color::Black => 1,
        };

    // Diagonal captures.
    for to in tables.pawn(us, from) & enemy {
        let Some(victim) = pos.piece_at(to) else {
            continue;
        };
        let score = CAPTURE_SCORE_OFFSET + mvv_lva(victim.kind, PieceKind::Pawn);
        if promoting {
            for flag in PROMOTION_FLAGS {
                let mut mv = Move::new(from, to, MoveKind::Promotion, flag);
                mv.set_score(score);
                list.push(mv);
            }
        } else {
            let mut mv = Move::new(from, to, MoveKind::Capture, FLAG_NONE);
            mv.set_score(score);
            list.push(mv);
        }
    }

    // En passant, when the capturing pawn actually covers the target.
    if let Some(ep) = pos.en_passant() {
        if tables.pawn(us, from).contains(ep) {
            let mut mv = Move::new(from, ep, MoveKind::Capture, FLAG_EN_PASSANT);
            mv.set_score(CAPTURE_SCORE_OFFSET + mvv_lva(PieceKind::Pawn, PieceKind::Pawn));
            list.push(mv);
        }
    }

    if !include_quiet {
        return;
    }

    let occupied = pos.occupancy();
    let dir: i16 = match us {
        Color::White => 8,
        Color::Black => -8,
    };

    let one = from as i16 + dir;
    if (0..64).contains(&one) && !occupied.contains(one as u8) {
        if promoting {
            for flag in PROMOTION_FLAGS {
                list.push(Move::new(from, one as u8, MoveKind::Promotion, flag));
            }
        } else {
            list.push(Move::new(from, one as u8, MoveKind::Quiet, FLAG_NONE));

            // Double push: only from the side's second rank, and only
            // if both squares ahead are empty.
            let start_rank = match us {
                Color::White => 1,
                Color::Black => 6,
            };
            if rank_of(from) == start_rank {
                let two = from as i16 + 2 * dir;
                if !occupied.contains(two as u8) {
                    list.push(Move::new(from, two as u8, MoveKind::Quiet, FLAG_DOUBLE_PUSH));
                }
            }
        }
    }
}

/// Castling needs the right bit, an empty gap, and a safe path: the
/// king may not castle out of, through, or into check.
fn gen_castling_moves(pos: &Position, tables: &AttackTables, list: &mut MoveList) {
    let occupied = pos.occupancy();
    let rights = pos.castling();

    match pos.side_to_move() {
        Color::White => {
            if rights.has(CastlingRights::WHITE_KING_SIDE)
                && (occupied & WHITE_KING_SIDE_GAP).is_empty()
                && !is_square_attacked(pos, 4, Color::Black, tables)
                && !is_square_attacked(pos, 5, Color::Black, tables)
                && !is_square_attacked(pos, 6, Color::Black, tables)
            {
                list.push(Move::new(4, 6, MoveKind::Castle, FLAG_NONE));
            }
            if rights.has(CastlingRights::WHITE_QUEEN_SIDE)
                && (occupied & WHITE_QUEEN_SIDE_GAP).is_empty()
                && !is_square_attacked(pos, 4, Color::Black, tables)
                && !is_square_attacked(pos, 3, Color::Black, tables)
                && !is_square_attacked(pos, 2, Color::Black, tables)
            {
                list.push(Move::new(4, 2, MoveKind::Castle, FLAG_NONE));
            }
        }
        Color::Black => {
            if rights.has(CastlingRights::BLACK_KING_SIDE)
                && (occupied & BLACK_KING_SIDE_GAP).is_empty()
                && !is_square_attacked(pos, 60, Color::White, tables)
                && !is_square_attacked(pos, 61, Color::White, tables)
                && !is_square_attacked(pos, 62, Color::White, tables)
            {
                list.push(Move::new(60, 62, MoveKind::Castle, FLAG_NONE));
            }
            if rights.has(CastlingRights::BLACK_QUEEN_SIDE)
                && (occupied & BLACK_QUEEN_SIDE_GAP).is_empty()
                && !is_square_attacked(pos, 60, Color::White, tables)
                && !is_square_attacked(pos, 59, Color::White, tables)
                && !is_square_attacked(pos, 58, Color::White, tables)
            {
                list.push(Move::new(60, 58, MoveKind::Castle, FLAG_NONE));
            }
        }
    }
}

/// Fully legal moves, filtered by playing each one. Boundary and test
/// helper; the search works on the pseudo-legal list directly.
pub fn legal_moves(pos: &Position, tables: &AttackTables) -> Vec<Move> {
    let mut scratch = pos.clone();
    let mut list = MoveList::new();
    generate_moves(&scratch, tables, true, &mut list);

    let mut out = Vec::with_capacity(list.len());
    for mv in list.iter() {
        if scratch.do_move(mv, tables) {
            scratch.undo_move();
            out.push(mv);
        }
    }
    out
}

/// Is `mv` a legal move here? Used to re-validate moves pulled from
/// the transposition table before trusting them.
pub fn move_exists(pos: &mut Position, tables: &AttackTables, mv: Move) -> bool {
    let mut list = MoveList::new();
    generate_moves(pos, tables, true, &mut list);

    for candidate in list.iter() {
        if candidate != mv {
            continue;
        }
        if pos.do_move(candidate, tables) {
            pos.undo_move();
            return true;
        }
    }
    false
}

#[cfg(test)]
#[path = "movegen_tests.rs"]
mod movegen_tests;
