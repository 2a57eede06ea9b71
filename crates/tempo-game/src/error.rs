//! Error types for the game engine.

/// Errors surfaced by move handling.
///
/// All of these are recovered locally: an illegal or rejected move rolls
/// the board back and is reported to the immediate caller; none of them
/// ever touches the connection.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The rules engine rejected the candidate move. Nothing was changed
    /// and nothing was sent.
    #[error("illegal move")]
    IllegalMove,

    /// The server refused the move (or submission failed); the optimistic
    /// update has been rolled back.
    #[error("move rejected: {0}")]
    MoveRejected(String),

    /// It is the opponent's turn.
    #[error("not your turn")]
    NotYourTurn,

    /// The game has reached a terminal state; no further moves are
    /// accepted.
    #[error("game is over")]
    GameOver,
}
