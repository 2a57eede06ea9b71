//! Game session state: the client's view of one live game.

use std::fmt;

use tempo_protocol::{Color, Fen, GameId, Move};

use crate::Clocks;

/// Why a game is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawReason {
    Stalemate,
    ThreefoldRepetition,
    InsufficientMaterial,
    /// Drawn for a reason the rules engine tracks but doesn't name
    /// (fifty-move rule, agreement).
    Other,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stalemate => write!(f, "stalemate"),
            Self::ThreefoldRepetition => write!(f, "threefold repetition"),
            Self::InsufficientMaterial => write!(f, "insufficient material"),
            Self::Other => write!(f, "draw"),
        }
    }
}

/// The lifecycle status of a game.
///
/// Exactly one status holds at a time, and only `InProgress` accepts
/// moves or clock ticks. Everything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    Checkmate { winner: Color },
    Draw { reason: DrawReason },
    Resigned { winner: Color },
    Timeout { winner: Color },
}

impl GameStatus {
    /// Whether no further moves are accepted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InProgress => write!(f, "in progress"),
            Self::Checkmate { winner } => {
                write!(f, "checkmate — {winner} wins")
            }
            Self::Draw { reason } => write!(f, "draw — {reason}"),
            Self::Resigned { winner } => {
                write!(f, "resignation — {winner} wins")
            }
            Self::Timeout { winner } => {
                write!(f, "time out — {winner} wins")
            }
        }
    }
}

/// A locally applied move awaiting the server's verdict.
///
/// Exists only between the optimistic update and the server's
/// confirmation or rejection; either outcome clears it. Carries the
/// exact pre-move state so rollback restores the board bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub mv: Move,
    pub prior_position: Fen,
    pub prior_turn: Color,
}

/// The client's view of one game.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub game_id: GameId,
    /// The side this client controls.
    pub local_color: Color,
    pub position: Fen,
    pub turn_owner: Color,
    pub clocks: Clocks,
    pub status: GameStatus,
    pub pending_local_move: Option<PendingMove>,
    /// Set once both players are present and the clock may run.
    pub started: bool,
}

impl GameSession {
    /// A fresh game from the starting position, white to move.
    pub fn new(
        game_id: GameId,
        local_color: Color,
        clocks: Clocks,
    ) -> Self {
        Self {
            game_id,
            local_color,
            position: Fen::starting(),
            turn_owner: Color::White,
            clocks,
            status: GameStatus::InProgress,
            pending_local_move: None,
            started: false,
        }
    }

    /// Whether the local player may move right now.
    pub fn is_local_turn(&self) -> bool {
        self.turn_owner == self.local_color
            && !self.status.is_terminal()
    }
}
