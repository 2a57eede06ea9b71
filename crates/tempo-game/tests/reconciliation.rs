//! Integration tests for the reconciliation engine using a scripted
//! rules engine.
//!
//! The rules engine is scripted per position: which moves are legal,
//! whose turn each position encodes, and which terminal shapes each
//! position satisfies. That keeps every reconciliation path — optimistic
//! apply, server confirmation, rollback, terminal detection — observable
//! without a board implementation anywhere.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tempo_game::{
    evaluate_terminal, ClockEvent, Clocks, DrawReason, GameEngine,
    GameError, GameNotice, GameSession, GameStatus, RulesEngine,
    TimeControl,
};
use tempo_protocol::{
    Color, Destination, Fen, GameEvent, GameId, Move, Promotion,
};

// =========================================================================
// Scripted rules engine
// =========================================================================

#[derive(Default)]
struct ScriptedRules {
    /// (position, "fromto") → resulting position.
    legal: HashMap<(String, String), String>,
    /// position → side to move. Missing positions default to White.
    turns: HashMap<String, Color>,
    checkmates: HashSet<String>,
    stalemates: HashSet<String>,
    threefolds: HashSet<String>,
    insufficient: HashSet<String>,
    other_draws: HashSet<String>,
}

impl ScriptedRules {
    fn allow(mut self, from_pos: &str, mv: &str, to_pos: &str) -> Self {
        self.legal
            .insert((from_pos.into(), mv.into()), to_pos.into());
        self
    }

    fn turn(mut self, pos: &str, color: Color) -> Self {
        self.turns.insert(pos.into(), color);
        self
    }

    fn checkmate(mut self, pos: &str) -> Self {
        self.checkmates.insert(pos.into());
        self
    }

    fn stalemate(mut self, pos: &str) -> Self {
        self.stalemates.insert(pos.into());
        self
    }

    fn threefold(mut self, pos: &str) -> Self {
        self.threefolds.insert(pos.into());
        self
    }

    fn insufficient(mut self, pos: &str) -> Self {
        self.insufficient.insert(pos.into());
        self
    }

    fn other_draw(mut self, pos: &str) -> Self {
        self.other_draws.insert(pos.into());
        self
    }

    fn arc(self) -> Arc<dyn RulesEngine> {
        Arc::new(self)
    }
}

impl RulesEngine for ScriptedRules {
    fn apply_move(&self, position: &Fen, mv: &Move) -> Option<Fen> {
        let key = (position.0.clone(), format!("{}{}", mv.from, mv.to));
        self.legal.get(&key).map(|p| Fen(p.clone()))
    }

    fn turn_owner(&self, position: &Fen) -> Color {
        self.turns
            .get(&position.0)
            .copied()
            .unwrap_or(Color::White)
    }

    fn is_checkmate(&self, position: &Fen) -> bool {
        self.checkmates.contains(&position.0)
    }

    fn is_stalemate(&self, position: &Fen) -> bool {
        self.stalemates.contains(&position.0)
    }

    fn is_threefold_repetition(&self, position: &Fen) -> bool {
        self.threefolds.contains(&position.0)
    }

    fn is_insufficient_material(&self, position: &Fen) -> bool {
        self.insufficient.contains(&position.0)
    }

    fn is_draw(&self, position: &Fen) -> bool {
        self.other_draws.contains(&position.0)
    }
}

// =========================================================================
// Fixtures
// =========================================================================

const GAME: GameId = GameId(7);

fn session_at(pos: &str, local: Color, turn: Color) -> GameSession {
    GameSession {
        game_id: GAME,
        local_color: local,
        position: Fen(pos.into()),
        turn_owner: turn,
        clocks: Clocks::new(TimeControl::Rapid10.initial()),
        status: GameStatus::InProgress,
        pending_local_move: None,
        started: true,
    }
}

/// White to move at "start", e2e4 leading to "after-e4" where black is
/// to move.
fn opening_rules() -> ScriptedRules {
    ScriptedRules::default()
        .allow("start", "e2e4", "after-e4")
        .turn("start", Color::White)
        .turn("after-e4", Color::Black)
}

fn white_engine(rules: ScriptedRules) -> GameEngine {
    GameEngine::new(
        session_at("start", Color::White, Color::White),
        rules.arc(),
    )
}

// =========================================================================
// attempt_move
// =========================================================================

#[test]
fn test_attempt_move_applies_optimistically_and_returns_publish() {
    let mut engine = white_engine(opening_rules());

    let publish = engine
        .attempt_move("e2", "e4", None)
        .expect("legal move");

    assert_eq!(publish.destination, Destination::ChessMove);
    assert_eq!(publish.body["gameId"], 7);
    assert_eq!(publish.body["move"]["from"], "e2");
    assert_eq!(publish.body["newPosition"], "after-e4");

    let s = engine.session();
    assert_eq!(s.position, Fen("after-e4".into()));
    assert_eq!(s.turn_owner, Color::Black, "turn indicator flips");
    assert!(s.pending_local_move.is_some());
}

#[test]
fn test_attempt_move_defaults_promotion_to_queen() {
    let mut engine = white_engine(opening_rules());
    let publish = engine.attempt_move("e2", "e4", None).unwrap();
    assert_eq!(publish.body["move"]["promotion"], "q");

    let mut engine = white_engine(
        opening_rules().allow("start", "e7e8", "promoted"),
    );
    let publish = engine
        .attempt_move("e7", "e8", Some(Promotion::Knight))
        .unwrap();
    assert_eq!(publish.body["move"]["promotion"], "n");
}

#[test]
fn test_attempt_move_out_of_turn_rejects_immediately() {
    let rules = opening_rules();
    let mut engine = GameEngine::new(
        session_at("start", Color::White, Color::Black),
        rules.arc(),
    );

    let result = engine.attempt_move("e2", "e4", None);

    assert!(matches!(result, Err(GameError::NotYourTurn)));
    assert_eq!(engine.session().position, Fen("start".into()));
    assert!(engine.session().pending_local_move.is_none());
}

#[test]
fn test_attempt_move_after_terminal_status_rejects() {
    let mut session = session_at("start", Color::White, Color::White);
    session.status = GameStatus::Timeout {
        winner: Color::Black,
    };
    let mut engine = GameEngine::new(session, opening_rules().arc());

    assert!(matches!(
        engine.attempt_move("e2", "e4", None),
        Err(GameError::GameOver)
    ));
}

#[test]
fn test_attempt_move_illegal_has_no_side_effects() {
    let mut engine = white_engine(opening_rules());

    let result = engine.attempt_move("e2", "e5", None);

    assert!(matches!(result, Err(GameError::IllegalMove)));
    assert_eq!(engine.session().position, Fen("start".into()));
    assert_eq!(engine.session().turn_owner, Color::White);
    assert!(engine.session().pending_local_move.is_none());
}

// =========================================================================
// Confirmation
// =========================================================================

#[test]
fn test_confirmation_clears_pending_and_flips_turn_to_opponent() {
    let mut engine = white_engine(opening_rules());
    engine.attempt_move("e2", "e4", None).unwrap();

    let notices = engine.handle_event(GameEvent::Update {
        game_id: GAME,
        fen: Fen("after-e4".into()),
        turn: Color::Black,
    });

    assert_eq!(notices, vec![GameNotice::PositionChanged]);
    let s = engine.session();
    assert!(s.pending_local_move.is_none());
    assert_eq!(s.turn_owner, Color::Black);
    assert_eq!(s.status, GameStatus::InProgress);

    // Black's clock is the one ticking now.
    let before = engine.session().clocks;
    engine.tick_clock();
    assert_eq!(engine.session().clocks.white, before.white);
    assert_eq!(
        engine.session().clocks.black,
        before.black - Duration::from_secs(1)
    );
}

#[test]
fn test_confirmation_with_divergent_position_adopts_server_truth() {
    // The opponent's move raced ours; the server's answer reflects a
    // position we never computed locally.
    let rules = opening_rules().turn("server-truth", Color::White);
    let mut engine = white_engine(rules);
    engine.attempt_move("e2", "e4", None).unwrap();

    engine.handle_event(GameEvent::Update {
        game_id: GAME,
        fen: Fen("server-truth".into()),
        turn: Color::White,
    });

    let s = engine.session();
    assert_eq!(s.position, Fen("server-truth".into()));
    assert_eq!(s.turn_owner, Color::White);
    assert!(s.pending_local_move.is_none());
}

#[test]
fn test_confirmation_into_checkmate_reports_game_end() {
    let rules = opening_rules()
        .allow("start", "f3h5", "mated")
        .turn("mated", Color::Black)
        .checkmate("mated");
    let mut engine = white_engine(rules);
    engine.attempt_move("f3", "h5", None).unwrap();

    let notices = engine.handle_event(GameEvent::Update {
        game_id: GAME,
        fen: Fen("mated".into()),
        turn: Color::Black,
    });

    // Black is to move and mated, so white won.
    assert!(notices.contains(&GameNotice::GameEnded {
        status: GameStatus::Checkmate {
            winner: Color::White
        }
    }));
    assert!(engine.session().status.is_terminal());
}

#[test]
fn test_update_for_other_game_is_ignored() {
    let mut engine = white_engine(opening_rules());
    engine.attempt_move("e2", "e4", None).unwrap();

    let notices = engine.handle_event(GameEvent::Update {
        game_id: GameId(999),
        fen: Fen("elsewhere".into()),
        turn: Color::White,
    });

    assert!(notices.is_empty());
    assert_eq!(engine.session().position, Fen("after-e4".into()));
    assert!(engine.session().pending_local_move.is_some());
}

#[test]
fn test_update_cannot_resurrect_finished_game() {
    let mut session = session_at("start", Color::White, Color::White);
    session.status = GameStatus::Timeout {
        winner: Color::Black,
    };
    let mut engine = GameEngine::new(session, opening_rules().arc());

    engine.handle_event(GameEvent::Update {
        game_id: GAME,
        fen: Fen("after-e4".into()),
        turn: Color::Black,
    });

    assert_eq!(
        engine.session().status,
        GameStatus::Timeout {
            winner: Color::Black
        }
    );
}

// =========================================================================
// Rejection and rollback
// =========================================================================

#[test]
fn test_rejection_rolls_back_to_pre_move_state() {
    let mut engine = white_engine(opening_rules());
    engine.attempt_move("e2", "e4", None).unwrap();

    let notices = engine.handle_event(GameEvent::MoveRejected {
        game_id: GAME,
        reason: "stale position".into(),
    });

    assert_eq!(
        notices,
        vec![GameNotice::MoveRejected {
            reason: "stale position".into()
        }]
    );
    let s = engine.session();
    assert_eq!(s.position, Fen("start".into()), "board snaps back");
    assert_eq!(s.turn_owner, Color::White);
    assert!(s.pending_local_move.is_none());
}

#[test]
fn test_rollback_is_lossless_across_repeated_rejections() {
    // Every submission gets rejected; after any number of rounds the
    // position equals the pre-sequence starting position.
    let rules = opening_rules()
        .allow("start", "d2d4", "after-d4")
        .allow("start", "g1f3", "after-nf3");
    let mut engine = white_engine(rules);

    for mv in [("e2", "e4"), ("d2", "d4"), ("g1", "f3")] {
        engine.attempt_move(mv.0, mv.1, None).expect("legal");
        engine.handle_event(GameEvent::MoveRejected {
            game_id: GAME,
            reason: "no".into(),
        });
    }

    assert_eq!(engine.session().position, Fen("start".into()));
    assert_eq!(engine.session().turn_owner, Color::White);
    assert!(engine.session().pending_local_move.is_none());
}

#[test]
fn test_submit_failure_rolls_back() {
    let mut engine = white_engine(opening_rules());
    engine.attempt_move("e2", "e4", None).unwrap();

    let err = engine.on_submit_failed();

    assert!(matches!(err, GameError::MoveRejected(_)));
    assert_eq!(engine.session().position, Fen("start".into()));
}

#[test]
fn test_stale_rejection_without_pending_is_dropped() {
    let mut engine = white_engine(opening_rules());

    let notices = engine.handle_event(GameEvent::MoveRejected {
        game_id: GAME,
        reason: "late".into(),
    });

    assert!(notices.is_empty());
    assert_eq!(engine.session().position, Fen("start".into()));
}

#[test]
fn test_disconnect_invalidation_drops_pending() {
    let mut engine = white_engine(opening_rules());
    engine.attempt_move("e2", "e4", None).unwrap();

    engine.invalidate_pending();

    assert!(engine.session().pending_local_move.is_none());
    assert_eq!(engine.session().position, Fen("start".into()));
}

// =========================================================================
// Terminal precedence
// =========================================================================

#[test]
fn test_checkmate_beats_every_draw_shape() {
    let rules = ScriptedRules::default()
        .turn("pos", Color::Black)
        .checkmate("pos")
        .stalemate("pos")
        .threefold("pos")
        .insufficient("pos")
        .other_draw("pos");

    let status = evaluate_terminal(&Fen("pos".into()), &rules);

    assert_eq!(
        status,
        GameStatus::Checkmate {
            winner: Color::White
        },
        "checkmate must never be misreported as a draw"
    );
}

#[test]
fn test_stalemate_beats_repetition_and_material() {
    let rules = ScriptedRules::default()
        .stalemate("pos")
        .threefold("pos")
        .insufficient("pos");
    assert_eq!(
        evaluate_terminal(&Fen("pos".into()), &rules),
        GameStatus::Draw {
            reason: DrawReason::Stalemate
        }
    );
}

#[test]
fn test_repetition_beats_insufficient_material() {
    let rules = ScriptedRules::default()
        .threefold("pos")
        .insufficient("pos")
        .other_draw("pos");
    assert_eq!(
        evaluate_terminal(&Fen("pos".into()), &rules),
        GameStatus::Draw {
            reason: DrawReason::ThreefoldRepetition
        }
    );
}

#[test]
fn test_insufficient_material_beats_generic_draw() {
    let rules = ScriptedRules::default()
        .insufficient("pos")
        .other_draw("pos");
    assert_eq!(
        evaluate_terminal(&Fen("pos".into()), &rules),
        GameStatus::Draw {
            reason: DrawReason::InsufficientMaterial
        }
    );
}

#[test]
fn test_generic_draw_then_in_progress() {
    let rules = ScriptedRules::default().other_draw("pos");
    assert_eq!(
        evaluate_terminal(&Fen("pos".into()), &rules),
        GameStatus::Draw {
            reason: DrawReason::Other
        }
    );
    assert_eq!(
        evaluate_terminal(&Fen("clean".into()), &rules),
        GameStatus::InProgress
    );
}

// =========================================================================
// Resignation and timeout
// =========================================================================

#[test]
fn test_opponent_resignation_ends_game() {
    let mut engine = white_engine(opening_rules());

    let notices = engine.handle_event(GameEvent::Resigned {
        game_id: GAME,
        winner: Color::White,
    });

    assert_eq!(
        notices,
        vec![GameNotice::GameEnded {
            status: GameStatus::Resigned {
                winner: Color::White
            }
        }]
    );
}

#[test]
fn test_resign_local_declares_opponent_winner() {
    let mut engine = white_engine(opening_rules());
    let status = engine.resign_local();
    assert_eq!(
        status,
        GameStatus::Resigned {
            winner: Color::Black
        }
    );
}

#[test]
fn test_white_flag_fall_declares_black_winner_and_blocks_moves() {
    let mut session = session_at("start", Color::White, Color::White);
    session.clocks = Clocks {
        white: Duration::from_secs(2),
        black: Duration::from_secs(600),
    };
    let mut engine = GameEngine::new(session, opening_rules().arc());

    assert!(matches!(
        engine.tick_clock(),
        Some(ClockEvent::Tick { .. })
    ));
    assert_eq!(
        engine.tick_clock(),
        Some(ClockEvent::FlagFall {
            winner: Color::Black
        })
    );

    // The game ended locally and immediately.
    assert_eq!(
        engine.session().status,
        GameStatus::Timeout {
            winner: Color::Black
        }
    );
    assert!(matches!(
        engine.attempt_move("e2", "e4", None),
        Err(GameError::GameOver)
    ));
    // The timer that fires one beat late does nothing.
    assert_eq!(engine.tick_clock(), None);
}

#[test]
fn test_clock_does_not_tick_before_start_or_after_end() {
    let mut session = session_at("start", Color::White, Color::White);
    session.started = false;
    let mut engine = GameEngine::new(session, opening_rules().arc());
    assert_eq!(engine.tick_clock(), None);

    engine.start();
    assert!(engine.tick_clock().is_some());
}
