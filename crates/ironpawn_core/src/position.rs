//! The mutable game state: piece bitboards, the mirrored square array,
//! castling rights, en-passant target, clocks, the incremental Zobrist
//! hash and the make/unmake history stack.
//!
//! The bitboards and the square array are redundant on purpose (O(1)
//! set iteration and O(1) point lookup respectively). Every placement
//! write goes through `add_piece`/`remove_piece`/`move_piece` so the
//! two representations and the hash can never drift apart.

use thiserror::Error;

use crate::attacks::AttackTables;
use crate::bitboard::Bitboard;
use crate::movegen::is_square_attacked;
use crate::moves::{Move, MoveKind};
use crate::types::{coord_to_sq, file_of, make_sq, sq_to_coord, Color, Piece, PieceKind};
use crate::zobrist::ZOBRIST;

/// Upper bound on the length of a game, in plies.
pub const MAX_GAME_MOVES: usize = 2048;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Castling rights as a four-bit mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const WHITE_KING_SIDE: u8 = 1;
    pub const WHITE_QUEEN_SIDE: u8 = 2;
    pub const BLACK_KING_SIDE: u8 = 4;
    pub const BLACK_QUEEN_SIDE: u8 = 8;

    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(15);

    #[inline(always)]
    pub fn has(self, right: u8) -> bool {
        self.0 & right != 0
    }

    pub fn allow(&mut self, right: u8) {
        self.0 |= right;
    }

    /// Keep only the rights present in `keep`.
    #[inline(always)]
    fn retain(&mut self, keep: u8) {
        self.0 &= keep;
    }

    /// The raw mask, 0..16; indexes the Zobrist castling keys.
    #[inline(always)]
    pub fn mask(self) -> u8 {
        self.0
    }
}

/// Rights that survive a move touching each square. Moving any piece
/// off (or onto) a king or rook home square strips the matching bits.
static CASTLE_SPOILERS: [u8; 64] = {
    let mut table = [15u8; 64];
    table[0] = 13; // a1
    table[4] = 12; // e1
    table[7] = 14; // h1
    table[56] = 7; // a8
    table[60] = 3; // e8
    table[63] = 11; // h8
    table
};

/// One undo record. Snapshots everything `do_move` cannot cheaply
/// reconstruct, including the full pre-move hash.
#[derive(Clone, Copy, Debug)]
struct HistoryEntry {
    hash: u64,
    mv: Move,
    captured: Option<Piece>,
    castling: CastlingRights,
    en_passant: Option<u8>,
    halfmove_clock: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("FEN is missing required fields")]
    MissingFields,
    #[error("FEN board must describe 8 ranks of 8 files")]
    BadBoardShape,
    #[error("invalid piece character {0:?} in FEN board")]
    InvalidPiece(char),
    #[error("invalid side to move {0:?}")]
    InvalidSideToMove(String),
    #[error("invalid castling character {0:?}")]
    InvalidCastling(char),
    #[error("invalid en-passant square {0:?}")]
    InvalidEnPassant(String),
    #[error("invalid move counter {0:?}")]
    InvalidCounter(String),
}

#[derive(Clone, Debug)]
pub struct Position {
    /// Per piece bitboards, [color][kind].
    piece_bbs: [[Bitboard; 6]; 2],
    /// All pieces of each side.
    side_bbs: [Bitboard; 2],
    /// All pieces of both sides.
    occupied: Bitboard,
    /// Square-indexed mirror of the bitboards for O(1) point lookup.
    squares: [Option<Piece>; 64],

    side_to_move: Color,
    castling: CastlingRights,
    en_passant: Option<u8>,
    halfmove_clock: u32,
    fullmove_number: u32,
    /// Search ply: distance from the position the searcher was handed.
    ply: usize,
    hash: u64,

    history: Vec<HistoryEntry>,
}

impl Position {
    fn empty() -> Self {
        Position {
            piece_bbs: [[Bitboard::EMPTY; 6]; 2],
            side_bbs: [Bitboard::EMPTY; 2],
            occupied: Bitboard::EMPTY,
            squares: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
            ply: 0,
            hash: 0,
            history: Vec::with_capacity(MAX_GAME_MOVES),
        }
    }

    pub fn startpos() -> Self {
        Self::from_fen(START_FEN).expect("start position FEN parses")
    }

    /// Parse a six-field FEN string. The halfmove clock and fullmove
    /// number are optional and default to 0 and 1.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut fields = fen.split_whitespace();
        let board = fields.next().ok_or(FenError::MissingFields)?;
        let side = fields.next().ok_or(FenError::MissingFields)?;
        let castling = fields.next().ok_or(FenError::MissingFields)?;
        let en_passant = fields.next().ok_or(FenError::MissingFields)?;
        let halfmove = fields.next().unwrap_or("0");
        let fullmove = fields.next().unwrap_or("1");

        let mut pos = Position::empty();

        let ranks: Vec<&str> = board.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::BadBoardShape);
        }
        for (row, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - row as u8; // FEN lists rank 8 first
            let mut file = 0u8;
            for ch in rank_str.chars() {
                if let Some(skip) = ch.to_digit(10) {
                    if skip == 0 || skip > 8 {
                        return Err(FenError::BadBoardShape);
                    }
                    file += skip as u8;
                } else {
                    let color = if ch.is_ascii_uppercase() {
                        Color::White
                    } else {
                        Color::Black
                    };
                    let kind = match ch.to_ascii_lowercase() {
                        'p' => PieceKind::Pawn,
                        'n' => PieceKind::Knight,
                        'b' => PieceKind::Bishop,
                        'r' => PieceKind::Rook,
                        'q' => PieceKind::Queen,
                        'k' => PieceKind::King,
                        _ => return Err(FenError::InvalidPiece(ch)),
                    };
                    if file >= 8 {
                        return Err(FenError::BadBoardShape);
                    }
                    pos.add_piece(make_sq(file, rank), Piece::new(color, kind));
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::BadBoardShape);
                }
            }
            if file != 8 {
                return Err(FenError::BadBoardShape);
            }
        }

        pos.side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(FenError::InvalidSideToMove(side.to_string())),
        };

        if castling != "-" {
            for c in castling.chars() {
                match c {
                    'K' => pos.castling.allow(CastlingRights::WHITE_KING_SIDE),
                    'Q' => pos.castling.allow(CastlingRights::WHITE_QUEEN_SIDE),
                    'k' => pos.castling.allow(CastlingRights::BLACK_KING_SIDE),
                    'q' => pos.castling.allow(CastlingRights::BLACK_QUEEN_SIDE),
                    _ => return Err(FenError::InvalidCastling(c)),
                }
            }
        }

        pos.en_passant = if en_passant == "-" {
            None
        } else {
            Some(
                coord_to_sq(en_passant)
                    .ok_or_else(|| FenError::InvalidEnPassant(en_passant.to_string()))?,
            )
        };

        pos.halfmove_clock = halfmove
            .parse()
            .map_err(|_| FenError::InvalidCounter(halfmove.to_string()))?;
        pos.fullmove_number = fullmove
            .parse()
            .map_err(|_| FenError::InvalidCounter(fullmove.to_string()))?;

        pos.hash = pos.compute_hash();
        Ok(pos)
    }

    /// Serialize back to a FEN string.
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8u8).rev() {
            let mut run = 0;
            for file in 0..8u8 {
                match self.squares[make_sq(file, rank) as usize] {
                    None => run += 1,
                    Some(piece) => {
                        if run > 0 {
                            fen.push(char::from_digit(run, 10).unwrap());
                            run = 0;
                        }
                        let c = match piece.kind {
                            PieceKind::Pawn => 'p',
                            PieceKind::Knight => 'n',
                            PieceKind::Bishop => 'b',
                            PieceKind::Rook => 'r',
                            PieceKind::Queen => 'q',
                            PieceKind::King => 'k',
                        };
                        fen.push(if piece.color == Color::White {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        });
                    }
                }
            }
            if run > 0 {
                fen.push(char::from_digit(run, 10).unwrap());
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side_to_move == Color::White { 'w' } else { 'b' });

        fen.push(' ');
        if self.castling == CastlingRights::NONE {
            fen.push('-');
        } else {
            for (right, c) in [
                (CastlingRights::WHITE_KING_SIDE, 'K'),
                (CastlingRights::WHITE_QUEEN_SIDE, 'Q'),
                (CastlingRights::BLACK_KING_SIDE, 'k'),
                (CastlingRights::BLACK_QUEEN_SIDE, 'q'),
            ] {
                if self.castling.has(right) {
                    fen.push(c);
                }
            }
        }

        fen.push(' ');
        match self.en_passant {
            Some(sq) => fen.push_str(&sq_to_coord(sq)),
            None => fen.push('-'),
        }

        fen.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        fen
    }

    // Read accessors.

    #[inline(always)]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline(always)]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline(always)]
    pub fn en_passant(&self) -> Option<u8> {
        self.en_passant
    }

    #[inline(always)]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline(always)]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[inline(always)]
    pub fn ply(&self) -> usize {
        self.ply
    }

    #[inline(always)]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline(always)]
    pub fn piece_at(&self, sq: u8) -> Option<Piece> {
        self.squares[sq as usize]
    }

    /// Bitboard of one piece kind of one side.
    #[inline(always)]
    pub fn pieces(&self, color: Color, kind: PieceKind) -> Bitboard {
        self.piece_bbs[color.idx()][kind.idx()]
    }

    /// All pieces of one side.
    #[inline(always)]
    pub fn side_occupancy(&self, color: Color) -> Bitboard {
        self.side_bbs[color.idx()]
    }

    /// All pieces of both sides.
    #[inline(always)]
    pub fn occupancy(&self) -> Bitboard {
        self.occupied
    }

    pub fn king_sq(&self, color: Color) -> Option<u8> {
        self.pieces(color, PieceKind::King).lsb()
    }

    /// Does this move capture something? (Includes en passant; the
    /// destination square is empty there.)
    #[inline(always)]
    pub fn is_capture(&self, mv: Move) -> bool {
        mv.is_en_passant() || self.squares[mv.to() as usize].is_some()
    }

    /// Zero the search ply. Called by a searcher taking ownership of
    /// the position so killer slots index from the search root.
    pub fn reset_ply(&mut self) {
        self.ply = 0;
    }

    // The three placement primitives. Everything that moves wood is
    // built from these so bitboards, square array and hash stay in
    // lockstep.

    fn add_piece(&mut self, sq: u8, piece: Piece) {
        debug_assert!(self.squares[sq as usize].is_none(), "add_piece to occupied square");
        self.piece_bbs[piece.color.idx()][piece.kind.idx()].set(sq);
        self.side_bbs[piece.color.idx()].set(sq);
        self.occupied.set(sq);
        self.squares[sq as usize] = Some(piece);
        self.hash ^= ZOBRIST.piece_key(piece, sq);
    }

    fn remove_piece(&mut self, sq: u8) -> Piece {
        let piece = self.squares[sq as usize].expect("remove_piece from empty square");
        self.piece_bbs[piece.color.idx()][piece.kind.idx()].clear(sq);
        self.side_bbs[piece.color.idx()].clear(sq);
        self.occupied.clear(sq);
        self.squares[sq as usize] = None;
        self.hash ^= ZOBRIST.piece_key(piece, sq);
        piece
    }

    fn move_piece(&mut self, from: u8, to: u8) {
        let piece = self.squares[from as usize].expect("move_piece from empty square");
        debug_assert!(self.squares[to as usize].is_none(), "move_piece to occupied square");
        let bb = &mut self.piece_bbs[piece.color.idx()][piece.kind.idx()];
        bb.clear(from);
        bb.set(to);
        let side = &mut self.side_bbs[piece.color.idx()];
        side.clear(from);
        side.set(to);
        self.occupied.clear(from);
        self.occupied.set(to);
        self.squares[from as usize] = None;
        self.squares[to as usize] = Some(piece);
        self.hash ^= ZOBRIST.piece_key(piece, from) ^ ZOBRIST.piece_key(piece, to);
    }

    /// Fold the hash from scratch off the current board state. Used to
    /// seed the hash on load; the incremental hash must always equal it.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0u64;
        for sq in 0..64u8 {
            if let Some(piece) = self.squares[sq as usize] {
                hash ^= ZOBRIST.piece_key(piece, sq);
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= ZOBRIST.side_to_move;
        }
        hash ^= ZOBRIST.castling_key(self.castling.mask());
        if let Some(ep) = self.en_passant {
            hash ^= ZOBRIST.ep_key(file_of(ep));
        }
        hash
    }

    pub fn in_check(&self, color: Color, tables: &AttackTables) -> bool {
        match self.king_sq(color) {
            Some(ksq) => is_square_attacked(self, ksq, color.other(), tables),
            None => false,
        }
    }

    /// Apply a pseudo-legal move. Returns false (with the position
    /// fully restored) if the move would leave the mover's own king
    /// attacked; that is the expected filter for pseudo-legal input,
    /// not an error.
    pub fn do_move(&mut self, mv: Move, tables: &AttackTables) -> bool {
        let from = mv.from();
        let to = mv.to();
        let us = self.side_to_move;
        let moved = self.squares[from as usize].expect("do_move from an empty square");
        debug_assert_eq!(moved.color, us, "do_move with the wrong side's piece");

        // En passant captures a pawn that is not on the target square.
        let capture_sq = if mv.is_en_passant() {
            match us {
                Color::White => to - 8,
                Color::Black => to + 8,
            }
        } else {
            to
        };
        let captured = self.squares[capture_sq as usize];
        debug_assert!(captured.map_or(true, |p| p.color != us), "capturing own piece");

        self.history.push(HistoryEntry {
            hash: self.hash,
            mv,
            captured,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
        });

        if captured.is_some() {
            self.remove_piece(capture_sq);
        }

        // Castling drags the rook along.
        if mv.kind() == MoveKind::Castle {
            let (rook_from, rook_to) = match to {
                6 => (7u8, 5u8),    // white O-O
                2 => (0, 3),        // white O-O-O
                62 => (63, 61),     // black O-O
                58 => (56, 59),     // black O-O-O
                _ => unreachable!("castle move to a non-castling square"),
            };
            self.move_piece(rook_from, rook_to);
        }

        // Any move clears the en-passant target; a double push below
        // may open a new one.
        if let Some(ep) = self.en_passant.take() {
            self.hash ^= ZOBRIST.ep_key(file_of(ep));
        }

        // Touching a king or rook home square strips castling rights.
        self.hash ^= ZOBRIST.castling_key(self.castling.mask());
        self.castling
            .retain(CASTLE_SPOILERS[from as usize] & CASTLE_SPOILERS[to as usize]);
        self.hash ^= ZOBRIST.castling_key(self.castling.mask());

        if moved.kind == PieceKind::Pawn || captured.is_some() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }

        if let Some(promoted) = mv.promoted_kind() {
            self.remove_piece(from);
            self.add_piece(to, Piece::new(us, promoted));
        } else {
            self.move_piece(from, to);
        }

        if mv.is_double_push() && moved.kind == PieceKind::Pawn {
            let ep_sq = match us {
                Color::White => from + 8,
                Color::Black => from - 8,
            };
            self.en_passant = Some(ep_sq);
            self.hash ^= ZOBRIST.ep_key(file_of(ep_sq));
        }

        if us == Color::Black {
            self.fullmove_number += 1;
        }
        self.ply += 1;
        self.side_to_move = us.other();
        self.hash ^= ZOBRIST.side_to_move;

        // Legality check happens after the flip: the move fails if the
        // new side to move now attacks the mover's king.
        if let Some(ksq) = self.king_sq(us) {
            if is_square_attacked(self, ksq, self.side_to_move, tables) {
                self.undo_move();
                return false;
            }
        }
        true
    }

    /// Reverse the most recent `do_move`. Fatal if no move was made.
    pub fn undo_move(&mut self) {
        let entry = self.history.pop().expect("undo_move with empty history");
        let mv = entry.mv;
        let from = mv.from();
        let to = mv.to();

        self.side_to_move = self.side_to_move.other();
        let us = self.side_to_move;
        self.ply = self.ply.saturating_sub(1);
        if us == Color::Black {
            self.fullmove_number -= 1;
        }

        if mv.kind() == MoveKind::Castle {
            let (rook_from, rook_to) = match to {
                6 => (7u8, 5u8),
                2 => (0, 3),
                62 => (63, 61),
                58 => (56, 59),
                _ => unreachable!("castle move to a non-castling square"),
            };
            self.move_piece(rook_to, rook_from);
        }

        // Bring the mover home; a promotion reverts to the pawn.
        if mv.promoted_kind().is_some() {
            self.remove_piece(to);
            self.add_piece(from, Piece::new(us, PieceKind::Pawn));
        } else {
            self.move_piece(to, from);
        }

        if let Some(captured) = entry.captured {
            let capture_sq = if mv.is_en_passant() {
                match us {
                    Color::White => to - 8,
                    Color::Black => to + 8,
                }
            } else {
                to
            };
            self.add_piece(capture_sq, captured);
        }

        self.castling = entry.castling;
        self.en_passant = entry.en_passant;
        self.halfmove_clock = entry.halfmove_clock;
        // The snapshot holds the exact pre-move fold; restoring it
        // wholesale cancels the piece-key churn above.
        self.hash = entry.hash;
    }

    // Draw probes.

    #[inline(always)]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// Has the current position occurred before since the last
    /// irreversible move? Only the reversible tail of the history can
    /// contain a repetition, so the scan is bounded by the halfmove
    /// clock.
    pub fn is_repetition(&self) -> bool {
        let len = self.history.len();
        if len < 2 {
            return false;
        }
        let end = len - 1;
        let start = len.saturating_sub(self.halfmove_clock as usize).min(end);
        self.history[start..end]
            .iter()
            .any(|entry| entry.hash == self.hash)
    }

    /// Neither side retains mating material.
    pub fn is_insufficient_material(&self) -> bool {
        use PieceKind::*;
        let count = |c: Color, k: PieceKind| self.pieces(c, k).popcount() as i32;

        if count(Color::White, Pawn) + count(Color::Black, Pawn) != 0 {
            return false;
        }

        let (wq, bq) = (count(Color::White, Queen), count(Color::Black, Queen));
        let (wr, br) = (count(Color::White, Rook), count(Color::Black, Rook));
        let (wb, bb) = (count(Color::White, Bishop), count(Color::Black, Bishop));
        let (wn, bn) = (count(Color::White, Knight), count(Color::Black, Knight));

        if wq + bq + wr + br == 0 {
            if wb == 0 && bb == 0 {
                return wn < 3 && bn < 3;
            }
            if wn == 0 && bn == 0 {
                return (wb - bb).abs() < 2;
            }
            return ((wn < 3 && wb == 0) || (wb == 1 && wn == 0))
                && ((bn < 3 && bb == 0) || (bb == 1 && bn == 0));
        }

        if wq + bq == 0 {
            if wr == 1 && br == 1 {
                return wn + wb < 2 && bn + bb < 2;
            }
            if wr == 1 && br == 0 {
                return wn + wb == 0 && (1..=2).contains(&(bn + bb));
            }
            if br == 1 && wr == 0 {
                return bn + bb == 0 && (1..=2).contains(&(wn + wb));
            }
        }

        false
    }
}

#[cfg(test)]
#[path = "position_tests.rs"]
mod position_tests;
