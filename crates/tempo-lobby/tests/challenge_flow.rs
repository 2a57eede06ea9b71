//! Integration tests for the challenge state machine.

use tempo_lobby::{ChallengeTracker, LobbyError, LobbyNotice};
use tempo_protocol::{
    ChallengeId, ChallengeNotice, ChallengeStatus, ChallengeUpdate,
    Destination, GameId, UserId,
};

fn notice(id: u64, challenger: u64, challenged: u64) -> ChallengeNotice {
    ChallengeNotice {
        id: ChallengeId(id),
        challenger_id: UserId(challenger),
        challenger_name: format!("user-{challenger}"),
        challenged_id: UserId(challenged),
    }
}

fn update(id: u64, status: ChallengeStatus) -> ChallengeUpdate {
    ChallengeUpdate {
        id: ChallengeId(id),
        status,
        game_id: None,
        challenger_id: None,
        challenged_id: None,
    }
}

// =========================================================================
// Recipient side
// =========================================================================

#[test]
fn test_first_inbound_challenge_becomes_current_prompt() {
    let mut tracker = ChallengeTracker::new();

    let notices = tracker.on_notice(notice(1, 5, 9));

    assert!(matches!(
        notices.as_slice(),
        [LobbyNotice::ChallengePrompt { challenge }]
            if challenge.id == ChallengeId(1)
    ));
    assert_eq!(tracker.current().unwrap().id, ChallengeId(1));
}

#[test]
fn test_additional_inbound_challenges_queue_not_drop() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));

    let notices = tracker.on_notice(notice(2, 6, 9));

    assert!(notices.is_empty(), "queued challenges don't prompt yet");
    assert_eq!(tracker.current().unwrap().id, ChallengeId(1));
    assert_eq!(tracker.queued_len(), 1);
}

#[test]
fn test_accept_publishes_and_update_hands_over_game_id() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));

    let publish = tracker.accept(ChallengeId(1)).expect("known challenge");
    assert_eq!(publish.destination, Destination::ChallengeAccept);
    assert_eq!(publish.body["challengeId"], 1);

    let mut accepted = update(1, ChallengeStatus::Accepted);
    accepted.game_id = Some(GameId(88));
    let notices = tracker.on_update(accepted);

    assert!(notices.contains(&LobbyNotice::GameReady {
        challenge_id: ChallengeId(1),
        game_id: GameId(88),
    }));
    assert!(tracker.current().is_none());
}

#[test]
fn test_accept_resolution_promotes_next_queued_challenge() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));
    tracker.on_notice(notice(2, 6, 9));

    tracker.accept(ChallengeId(1)).unwrap();
    let mut accepted = update(1, ChallengeStatus::Accepted);
    accepted.game_id = Some(GameId(88));
    let notices = tracker.on_update(accepted);

    assert!(
        notices.iter().any(|n| matches!(
            n,
            LobbyNotice::ChallengePrompt { challenge }
                if challenge.id == ChallengeId(2)
        )),
        "next queued challenge becomes the prompt"
    );
}

#[test]
fn test_accept_unknown_challenge_errors() {
    let mut tracker = ChallengeTracker::new();
    assert!(matches!(
        tracker.accept(ChallengeId(42)),
        Err(LobbyError::UnknownChallenge(ChallengeId(42)))
    ));
}

#[test]
fn test_decline_removes_locally_before_network_outcome() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));

    let (publish, _notices) =
        tracker.decline(ChallengeId(1)).expect("known");
    assert_eq!(publish.destination, Destination::ChallengeDecline);

    // Removed immediately — whatever happens to the publish.
    assert!(tracker.current().is_none());
    assert!(matches!(
        tracker.decline(ChallengeId(1)),
        Err(LobbyError::UnknownChallenge(_))
    ));
}

#[test]
fn test_decline_promotes_next_queued_challenge() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));
    tracker.on_notice(notice(2, 6, 9));

    let (_publish, notices) = tracker.decline(ChallengeId(1)).unwrap();

    assert!(notices.iter().any(|n| matches!(
        n,
        LobbyNotice::ChallengePrompt { challenge }
            if challenge.id == ChallengeId(2)
    )));
    assert_eq!(tracker.current().unwrap().id, ChallengeId(2));
}

#[test]
fn test_failed_accept_expires_the_challenge() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));
    tracker.accept(ChallengeId(1)).unwrap();

    let notices = tracker.on_accept_failed(ChallengeId(1));

    assert!(notices.contains(&LobbyNotice::ChallengeResolved {
        id: ChallengeId(1),
        status: ChallengeStatus::Expired,
        game_id: None,
    }));
    assert!(tracker.current().is_none());
}

// =========================================================================
// Challenger side
// =========================================================================

#[test]
fn test_send_builds_publish_with_challenged_id() {
    let tracker = ChallengeTracker::new();
    let publish = tracker.send(UserId(42));
    assert_eq!(publish.destination, Destination::ChallengeSend);
    assert_eq!(publish.body["challengedId"], 42);
}

#[test]
fn test_pending_update_registers_outgoing_challenge() {
    let mut tracker = ChallengeTracker::new();

    let mut pending = update(7, ChallengeStatus::Pending);
    pending.challenger_id = Some(UserId(9));
    pending.challenged_id = Some(UserId(42));
    let notices = tracker.on_update(pending);

    assert!(notices.is_empty());
    assert_eq!(
        tracker.outgoing_to(UserId(42)).unwrap().id,
        ChallengeId(7)
    );
}

#[test]
fn test_declined_outbound_challenge_is_removed_with_no_game() {
    let mut tracker = ChallengeTracker::new();
    let mut pending = update(7, ChallengeStatus::Pending);
    pending.challenger_id = Some(UserId(9));
    pending.challenged_id = Some(UserId(42));
    tracker.on_update(pending);

    let notices = tracker.on_update(update(7, ChallengeStatus::Declined));

    assert_eq!(
        notices,
        vec![LobbyNotice::ChallengeResolved {
            id: ChallengeId(7),
            status: ChallengeStatus::Declined,
            game_id: None,
        }]
    );
    assert!(tracker.outgoing_to(UserId(42)).is_none());
    assert!(
        !notices
            .iter()
            .any(|n| matches!(n, LobbyNotice::GameReady { .. })),
        "a declined challenge creates no game"
    );
}

#[test]
fn test_accepted_outbound_challenge_hands_over_game() {
    let mut tracker = ChallengeTracker::new();
    let mut pending = update(7, ChallengeStatus::Pending);
    pending.challenger_id = Some(UserId(9));
    pending.challenged_id = Some(UserId(42));
    tracker.on_update(pending);

    let mut accepted = update(7, ChallengeStatus::Accepted);
    accepted.game_id = Some(GameId(31));
    let notices = tracker.on_update(accepted);

    assert!(notices.contains(&LobbyNotice::GameReady {
        challenge_id: ChallengeId(7),
        game_id: GameId(31),
    }));
}

#[test]
fn test_update_for_unknown_challenge_is_ignored() {
    let mut tracker = ChallengeTracker::new();
    let notices = tracker.on_update(update(99, ChallengeStatus::Declined));
    assert!(notices.is_empty());
}

// =========================================================================
// Disconnect invalidation
// =========================================================================

#[test]
fn test_disconnect_expires_every_non_terminal_challenge() {
    let mut tracker = ChallengeTracker::new();
    tracker.on_notice(notice(1, 5, 9));
    tracker.on_notice(notice(2, 6, 9));
    let mut pending = update(7, ChallengeStatus::Pending);
    pending.challenger_id = Some(UserId(9));
    pending.challenged_id = Some(UserId(42));
    tracker.on_update(pending);

    let mut notices = tracker.on_disconnect();
    notices.sort_by_key(|n| match n {
        LobbyNotice::ChallengeResolved { id, .. } => id.0,
        _ => u64::MAX,
    });

    assert_eq!(notices.len(), 3);
    for (notice, expected_id) in notices.iter().zip([1u64, 2, 7]) {
        assert_eq!(
            notice,
            &LobbyNotice::ChallengeResolved {
                id: ChallengeId(expected_id),
                status: ChallengeStatus::Expired,
                game_id: None,
            }
        );
    }
    assert!(tracker.current().is_none());
    assert_eq!(tracker.queued_len(), 0);
}
