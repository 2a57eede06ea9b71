//! The move reconciliation engine.
//!
//! Flow for a local move:
//!
//! ```text
//! attempt_move ──legal?──→ optimistic update + PendingMove
//!      │                        │ (caller publishes the returned frame)
//!      │ illegal                ▼
//!      ▼                 server answers on the game topic
//!   GameError            ├── Update: adopt position wholesale, clear
//!   (no side effect)     │   pending, re-derive turn, check terminal
//!                        └── MoveRejected: roll back to the exact
//!                            pre-move state
//! ```
//!
//! The server's position always wins — even when it differs from the
//! optimistic copy, as it does when the opponent's move raced ours.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tempo_protocol::{
    ApiError, Color, Destination, Fen, GameEvent, GameId, Move,
    MoveSubmission, OutboundPublish, Promotion, UserId,
};

use crate::{
    ClockEvent, DrawReason, GameError, GameSession, GameStatus,
    PendingMove, RulesEngine,
};

// ---------------------------------------------------------------------------
// Pure reducers
// ---------------------------------------------------------------------------

/// Evaluates the terminal status of a position.
///
/// Precedence, first match wins: checkmate, stalemate, threefold
/// repetition, insufficient material, any other draw, in progress. Only
/// one status is ever surfaced, so the order is load-bearing — a
/// position that is both mate-shaped and material-starved is a
/// checkmate, full stop.
pub fn evaluate_terminal(
    position: &Fen,
    rules: &dyn RulesEngine,
) -> GameStatus {
    if rules.is_checkmate(position) {
        // The side to move is the one mated.
        GameStatus::Checkmate {
            winner: rules.turn_owner(position).opponent(),
        }
    } else if rules.is_stalemate(position) {
        GameStatus::Draw {
            reason: DrawReason::Stalemate,
        }
    } else if rules.is_threefold_repetition(position) {
        GameStatus::Draw {
            reason: DrawReason::ThreefoldRepetition,
        }
    } else if rules.is_insufficient_material(position) {
        GameStatus::Draw {
            reason: DrawReason::InsufficientMaterial,
        }
    } else if rules.is_draw(position) {
        GameStatus::Draw {
            reason: DrawReason::Other,
        }
    } else {
        GameStatus::InProgress
    }
}

/// Folds a server-confirmed position into the session.
///
/// Pure with respect to its inputs: clears any pending move, adopts the
/// server position as ground truth, re-derives the turn owner from it,
/// and re-evaluates terminal conditions. A session that was already
/// terminal stays terminal — a late update can't resurrect a finished
/// game.
pub fn reconcile(
    mut current: GameSession,
    server_position: Fen,
    rules: &dyn RulesEngine,
) -> GameSession {
    current.pending_local_move = None;
    current.position = server_position;
    current.turn_owner = rules.turn_owner(&current.position);
    if !current.status.is_terminal() {
        current.status = evaluate_terminal(&current.position, rules);
    }
    current
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What the rendering layer should know about after an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameNotice {
    /// Position, turn, or clocks changed; re-read the session.
    PositionChanged,
    /// A submitted move was refused and the board has snapped back.
    MoveRejected { reason: String },
    /// The game reached a terminal status.
    GameEnded { status: GameStatus },
}

/// Owns one [`GameSession`] and reconciles it against server events.
///
/// The engine holds no connection. `attempt_move` returns the publish
/// for the composition layer to route, and inbound game-topic events are
/// fed to [`handle_event`](Self::handle_event).
pub struct GameEngine {
    session: GameSession,
    rules: Arc<dyn RulesEngine>,
}

impl GameEngine {
    pub fn new(session: GameSession, rules: Arc<dyn RulesEngine>) -> Self {
        Self { session, rules }
    }

    /// The current session state.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Marks the game as started; the clock may run from here on.
    pub fn start(&mut self) {
        self.session.started = true;
    }

    /// Attempts a local move.
    ///
    /// On success the board is updated optimistically, the turn
    /// indicator flips, and the returned publish must be routed to the
    /// server; the move stays pending until the server answers. On any
    /// error, nothing changed and nothing must be sent.
    ///
    /// `promotion` defaults to queen when the move turns out to be a
    /// promotion and no hint was given.
    pub fn attempt_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<OutboundPublish, GameError> {
        let s = &self.session;
        if s.status.is_terminal() {
            return Err(GameError::GameOver);
        }
        if s.turn_owner != s.local_color {
            return Err(GameError::NotYourTurn);
        }

        let mv = Move {
            from: from.to_string(),
            to: to.to_string(),
            promotion: Some(promotion.unwrap_or(Promotion::Queen)),
        };
        // Evaluated against a copy; the session is untouched unless the
        // rules engine accepts the move.
        let Some(next) = self.rules.apply_move(&s.position, &mv) else {
            return Err(GameError::IllegalMove);
        };

        let s = &mut self.session;
        s.pending_local_move = Some(PendingMove {
            mv: mv.clone(),
            prior_position: s.position.clone(),
            prior_turn: s.turn_owner,
        });
        s.position = next.clone();
        s.turn_owner = s.local_color.opponent();
        debug!(game = %s.game_id, from, to, "move applied optimistically");

        let body = serde_json::to_value(MoveSubmission {
            game_id: s.game_id,
            mv,
            new_position: next,
        })
        .expect("move submission serializes to JSON");
        Ok(OutboundPublish {
            destination: Destination::ChessMove,
            body,
        })
    }

    /// Feeds one inbound game-topic event to the engine.
    ///
    /// Events are correlated by game id, not call order — an event for a
    /// different game is ignored wholesale.
    pub fn handle_event(&mut self, event: GameEvent) -> Vec<GameNotice> {
        match event {
            GameEvent::Update {
                game_id,
                fen,
                turn,
            } => {
                if game_id != self.session.game_id {
                    return Vec::new();
                }
                let prev_status = self.session.status;
                self.session = reconcile(
                    self.session.clone(),
                    fen,
                    self.rules.as_ref(),
                );
                if self.session.turn_owner != turn {
                    // The position is authoritative; the wire field is
                    // advisory. Disagreement means a buggy server.
                    debug!(
                        game = %game_id,
                        derived = %self.session.turn_owner,
                        advertised = %turn,
                        "turn owner mismatch, trusting the position"
                    );
                }

                let mut notices = vec![GameNotice::PositionChanged];
                if prev_status == GameStatus::InProgress
                    && self.session.status.is_terminal()
                {
                    notices.push(GameNotice::GameEnded {
                        status: self.session.status,
                    });
                }
                notices
            }

            GameEvent::MoveRejected { game_id, reason } => {
                if game_id != self.session.game_id {
                    return Vec::new();
                }
                if self.rollback() {
                    vec![GameNotice::MoveRejected { reason }]
                } else {
                    // Nothing pending — a rejection for a move the
                    // server already superseded. Stale; drop it.
                    Vec::new()
                }
            }

            GameEvent::Resigned { game_id, winner } => {
                if game_id != self.session.game_id
                    || self.session.status.is_terminal()
                {
                    return Vec::new();
                }
                self.session.status = GameStatus::Resigned { winner };
                vec![GameNotice::GameEnded {
                    status: self.session.status,
                }]
            }
        }
    }

    /// The submission never reached the server. Rolls the optimistic
    /// update back and names the failure.
    pub fn on_submit_failed(&mut self) -> GameError {
        self.rollback();
        GameError::MoveRejected("submission failed".into())
    }

    /// Drops any pending optimistic move (disconnect invalidation): the
    /// confirmation can no longer arrive on this connection, so the board
    /// snaps back to the last server-confirmed state.
    pub fn invalidate_pending(&mut self) {
        if self.rollback() {
            debug!(game = %self.session.game_id, "pending move invalidated");
        }
    }

    /// Resigns on behalf of the local player. Returns the resulting
    /// status; the caller is responsible for the server notification.
    pub fn resign_local(&mut self) -> GameStatus {
        if !self.session.status.is_terminal() {
            self.session.status = GameStatus::Resigned {
                winner: self.session.local_color.opponent(),
            };
        }
        self.session.status
    }

    /// One second of clock time for whoever owns the turn.
    ///
    /// `None` unless the game has started and is in progress — the
    /// caller's timer may fire a beat after the game ended, and that
    /// firing must do nothing. A flag fall ends the game locally and
    /// immediately: the winner is the side that still had time.
    pub fn tick_clock(&mut self) -> Option<ClockEvent> {
        let s = &mut self.session;
        if !s.started || s.status.is_terminal() {
            return None;
        }
        match s.clocks.tick_second(s.turn_owner) {
            None => Some(ClockEvent::Tick {
                white: s.clocks.white,
                black: s.clocks.black,
            }),
            Some(winner) => {
                s.status = GameStatus::Timeout { winner };
                debug!(game = %s.game_id, %winner, "flag fell");
                Some(ClockEvent::FlagFall { winner })
            }
        }
    }

    fn rollback(&mut self) -> bool {
        match self.session.pending_local_move.take() {
            Some(pending) => {
                self.session.position = pending.prior_position;
                self.session.turn_owner = pending.prior_turn;
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Non-real-time game calls
// ---------------------------------------------------------------------------

/// A stored game, as returned by the history/lookup endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub game_id: GameId,
    pub white_id: UserId,
    pub black_id: UserId,
    pub fen: Fen,
    /// Starting time per side, in seconds.
    pub initial_time: u64,
}

impl GameRecord {
    /// Which side `user` plays in this game, if either.
    pub fn color_of(&self, user: UserId) -> Option<Color> {
        if self.white_id == user {
            Some(Color::White)
        } else if self.black_id == user {
            Some(Color::Black)
        } else {
            None
        }
    }
}

/// The non-real-time game endpoints, consumed as results only.
pub trait GameApi: Send + Sync + 'static {
    /// Looks up a game record (used to learn colors and time control
    /// when a challenge turns into a game).
    fn fetch_game(
        &self,
        game_id: GameId,
    ) -> impl Future<Output = Result<GameRecord, ApiError>> + Send;

    /// Games awaiting this user (accepted challenges not yet finished).
    fn pending_games(
        &self,
    ) -> impl Future<Output = Result<Vec<GameRecord>, ApiError>> + Send;

    /// Reports a locally decided outcome (resignation, flag fall).
    fn end_game(
        &self,
        game_id: GameId,
        outcome: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}
