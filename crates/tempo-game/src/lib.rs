//! Optimistic move reconciliation and the game clock for Tempo.
//!
//! The heart of this crate is [`GameEngine`]: it applies the local
//! player's moves optimistically through the external [`RulesEngine`],
//! hands the caller the outbound publish to route, and reconciles the
//! server's authoritative answer — adopting confirmations wholesale and
//! rolling rejections back to the exact pre-move state.
//!
//! The engine never touches the network. [`GameEngine::attempt_move`]
//! *returns* what should be published; inbound events are *fed in* by the
//! composition layer. That keeps every reconciliation path testable with
//! nothing but a scripted rules engine.
//!
//! The per-second clock lives here too: [`Clocks`] is the pure
//! decrement-and-detect-flag-fall arithmetic, [`ClockDriver`] is the
//! 1 Hz timer task that applies it to a shared engine.

mod chat;
mod clock;
mod engine;
mod error;
mod rules;
mod session;

pub use chat::ChatLog;
pub use clock::{ClockDriver, ClockEvent, Clocks, TimeControl};
pub use engine::{evaluate_terminal, reconcile, GameApi, GameEngine, GameNotice, GameRecord};
pub use error::GameError;
pub use rules::RulesEngine;
pub use session::{DrawReason, GameSession, GameStatus, PendingMove};
