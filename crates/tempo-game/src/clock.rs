//! The game clock: pure per-second arithmetic plus a 1 Hz driver task.
//!
//! Exactly one of {white ticking, black ticking, neither} holds at any
//! instant — the ticking side is whoever owns the turn, and nothing
//! ticks unless the game has started and is still in progress. The
//! driver re-checks that on every firing, because a firing is not
//! guaranteed to be cancelled the instant the game ends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use tempo_protocol::Color;

use crate::GameEngine;

// ---------------------------------------------------------------------------
// Time controls
// ---------------------------------------------------------------------------

/// Preset time controls, bullet through rapid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeControl {
    Bullet1,
    Bullet2,
    Blitz3,
    Blitz5,
    #[default]
    Rapid10,
    Rapid15,
    Rapid30,
}

impl TimeControl {
    /// Starting time per side.
    pub fn initial(self) -> Duration {
        let minutes = match self {
            Self::Bullet1 => 1,
            Self::Bullet2 => 2,
            Self::Blitz3 => 3,
            Self::Blitz5 => 5,
            Self::Rapid10 => 10,
            Self::Rapid15 => 15,
            Self::Rapid30 => 30,
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bullet1 => "Bullet 1",
            Self::Bullet2 => "Bullet 2",
            Self::Blitz3 => "Blitz 3",
            Self::Blitz5 => "Blitz 5",
            Self::Rapid10 => "Rapid 10",
            Self::Rapid15 => "Rapid 15",
            Self::Rapid30 => "Rapid 30",
        }
    }
}

// ---------------------------------------------------------------------------
// Clocks
// ---------------------------------------------------------------------------

/// Remaining time for both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clocks {
    pub white: Duration,
    pub black: Duration,
}

impl Clocks {
    /// Both sides start with `initial`.
    pub fn new(initial: Duration) -> Self {
        Self {
            white: initial,
            black: initial,
        }
    }

    /// Remaining time for one side.
    pub fn remaining(&self, side: Color) -> Duration {
        match side {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    /// Deducts one second from `side`. Returns the winner (the *other*
    /// side) when `side`'s flag falls.
    pub fn tick_second(&mut self, side: Color) -> Option<Color> {
        let remaining = match side {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        };
        *remaining = remaining.saturating_sub(Duration::from_secs(1));
        if remaining.is_zero() {
            Some(side.opponent())
        } else {
            None
        }
    }
}

/// What one clock tick produced, for the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// A second elapsed; current remaining times.
    Tick { white: Duration, black: Duration },
    /// The ticking side ran out; `winner` is the other side. The game is
    /// over locally the moment this is emitted — independent of any
    /// server confirmation.
    FlagFall { winner: Color },
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// The 1 Hz task that ticks a shared [`GameEngine`]'s clock.
///
/// Stops on its own when the game reaches a terminal state; [`stop`]
/// exists for teardown before that (disconnect, view unmount).
///
/// [`stop`]: ClockDriver::stop
pub struct ClockDriver {
    handle: JoinHandle<()>,
}

impl ClockDriver {
    /// Ticks `engine` once a second, forwarding events to `events`.
    pub fn spawn(
        engine: Arc<Mutex<GameEngine>>,
        events: mpsc::Sender<ClockEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(1));
            // The immediate first tick would deduct a second at 0:00.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut engine = engine.lock().await;
                let Some(event) = engine.tick_clock() else {
                    // Not started, or already terminal. A terminal game
                    // never resumes; an unstarted one polls on.
                    if engine.session().status.is_terminal() {
                        break;
                    }
                    continue;
                };
                let flag_fell =
                    matches!(event, ClockEvent::FlagFall { .. });
                drop(engine);
                if events.send(event).await.is_err() {
                    break; // nobody is listening anymore
                }
                if flag_fell {
                    break;
                }
            }
            debug!("clock driver stopped");
        });
        Self { handle }
    }

    /// Stops the driver immediately.
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
