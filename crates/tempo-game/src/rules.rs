//! The chess rules engine, consumed as an external collaborator.
//!
//! Tempo does not know how chess works. Everything rules-shaped — move
//! legality, whose turn a position encodes, terminal conditions — goes
//! through this trait. Production wires in a real engine; tests script
//! one position at a time.

use tempo_protocol::{Color, Fen, Move};

/// A black-box chess rules engine operating on FEN-equivalent positions.
///
/// Implementations must be pure with respect to their inputs: the same
/// position and move always produce the same answer, and no call mutates
/// engine state observable by later calls. The reconciliation engine
/// leans on this to evaluate candidate moves against *copies* of the
/// current position.
pub trait RulesEngine: Send + Sync + 'static {
    /// Applies `mv` to `position`, returning the resulting position, or
    /// `None` when the move is illegal.
    fn apply_move(&self, position: &Fen, mv: &Move) -> Option<Fen>;

    /// The side to move in `position`.
    fn turn_owner(&self, position: &Fen) -> Color;

    /// Whether the side to move is checkmated.
    fn is_checkmate(&self, position: &Fen) -> bool;

    /// Whether the side to move has no legal move but is not in check.
    fn is_stalemate(&self, position: &Fen) -> bool;

    /// Whether the position has occurred three times.
    fn is_threefold_repetition(&self, position: &Fen) -> bool;

    /// Whether neither side can possibly deliver mate.
    fn is_insufficient_material(&self, position: &Fen) -> bool;

    /// Whether the position is drawn for any other reason the engine
    /// tracks (e.g. the fifty-move rule).
    fn is_draw(&self, position: &Fen) -> bool;
}
