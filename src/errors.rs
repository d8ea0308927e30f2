use thiserror::Error;

use crate::piece::Colour;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenParseError {
    #[error("FEN string is not ASCII")]
    NotAscii,
    #[error("unexpected character in piece placement: '{0}'")]
    UnexpectedCharacter(char),
    #[error("board part of FEN has {0} rank segments, expected 8")]
    BadRankCount(usize),
    #[error("rank segment does not describe exactly 8 squares")]
    BadSquaresInRank,
    #[error("expected side part")]
    MissingSide,
    #[error("expected side to be 'w' or 'b', got \"{0}\"")]
    InvalidSide(String),
    #[error("expected castling part")]
    MissingCastling,
    #[error("invalid castling format: \"{0}\"")]
    InvalidCastling(String),
    #[error("invalid en passant square: \"{0}\"")]
    InvalidEnPassant(String),
    #[error("invalid halfmove clock: \"{0}\"")]
    InvalidHalfmoveClock(String),
    #[error("invalid fullmove number: \"{0}\"")]
    InvalidFullmoveNumber(String),
    #[error("{0} king count is not exactly one")]
    BadKingCount(Colour),
    #[error("{0} has more than eight pawns")]
    TooManyPawns(Colour),
    #[error("{0} has more than sixteen pieces")]
    TooManyPieces(Colour),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveParseError {
    #[error("invalid move length {0}")]
    InvalidLength(usize),
    #[error("invalid square \"{0}\"")]
    InvalidSquare(String),
    #[error("invalid promotion piece '{0}'")]
    InvalidPromotionPiece(char),
    #[error("no piece on {0}")]
    EmptyFromSquare(String),
    #[error("illegal move {0}")]
    IllegalMove(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("asked to search for {requested} but {actual} is to move")]
    SideMismatch { requested: Colour, actual: Colour },
    #[error("search depth {0} exceeds the engine maximum")]
    DepthOutOfRange(u32),
    #[error("engine selected an illegal move {0}; this is a bug")]
    IllegalEngineMove(String),
}

/// Invariant checks on the position; a violation anywhere is a bug.
pub type PositionValidityError = String;
