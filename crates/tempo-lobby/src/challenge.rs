//! The challenge state machine.
//!
//! Two roles share one tracker:
//!
//! - **Recipient**: inbound challenges arrive on the user's challenge
//!   queue. One is the *current* prompt; the rest queue FIFO behind it,
//!   never dropped. Accepting or declining the current one promotes the
//!   next.
//! - **Challenger**: outbound challenges are registered from the first
//!   `Pending` update (which carries the server-assigned id) and resolve
//!   through later updates — a decline removes the entry and creates no
//!   game.
//!
//! Declines are fire-and-forget: the entry is removed the moment the
//! user declines, before the network outcome is known. The user's intent
//! was already expressed; a failed decline frame must not resurrect the
//! prompt.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use tempo_protocol::{
    ChallengeId, ChallengeNotice, ChallengeStatus, ChallengeUpdate,
    Destination, GameId, OutboundPublish, UserId,
};

use crate::LobbyError;

/// One challenge as this client sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub challenger_id: UserId,
    pub challenger_name: String,
    pub challenged_id: UserId,
    pub status: ChallengeStatus,
}

impl Challenge {
    fn from_notice(notice: ChallengeNotice) -> Self {
        Self {
            id: notice.id,
            challenger_id: notice.challenger_id,
            challenger_name: notice.challenger_name,
            challenged_id: notice.challenged_id,
            status: ChallengeStatus::Pending,
        }
    }
}

/// What the rendering layer should know about after a challenge event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyNotice {
    /// A challenge is now the current prompt for this user.
    ChallengePrompt { challenge: Challenge },
    /// A tracked challenge reached a terminal status. `game_id` is set
    /// exactly for `Accepted`.
    ChallengeResolved {
        id: ChallengeId,
        status: ChallengeStatus,
        game_id: Option<GameId>,
    },
    /// An accepted challenge produced a game; the caller establishes the
    /// game and chat subscriptions for it.
    GameReady {
        challenge_id: ChallengeId,
        game_id: GameId,
    },
}

/// Tracks every live challenge, inbound and outbound.
#[derive(Debug, Default)]
pub struct ChallengeTracker {
    /// The inbound challenge currently prompting the user.
    current: Option<Challenge>,
    /// Inbound challenges waiting behind the current prompt.
    queued: VecDeque<Challenge>,
    /// Challenges this user sent, keyed by server-assigned id.
    outgoing: HashMap<ChallengeId, Challenge>,
}

impl ChallengeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The inbound challenge currently prompting the user.
    pub fn current(&self) -> Option<&Challenge> {
        self.current.as_ref()
    }

    /// Inbound challenges queued behind the prompt.
    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    /// The pending outbound challenge to `user`, if any.
    pub fn outgoing_to(&self, user: UserId) -> Option<&Challenge> {
        self.outgoing.values().find(|c| c.challenged_id == user)
    }

    /// Builds the publish that challenges `challenged_id`.
    ///
    /// The tracker has nothing to record yet — the server assigns the
    /// challenge id and echoes it in the first `Pending` update.
    pub fn send(&self, challenged_id: UserId) -> OutboundPublish {
        OutboundPublish {
            destination: Destination::ChallengeSend,
            body: serde_json::json!({ "challengedId": challenged_id }),
        }
    }

    /// An inbound challenge arrived for this user.
    pub fn on_notice(&mut self, notice: ChallengeNotice) -> Vec<LobbyNotice> {
        let challenge = Challenge::from_notice(notice);
        if self.current.is_some() {
            debug!(id = %challenge.id, "challenge queued behind current prompt");
            self.queued.push_back(challenge);
            return Vec::new();
        }
        self.current = Some(challenge.clone());
        vec![LobbyNotice::ChallengePrompt { challenge }]
    }

    /// Accepts a tracked inbound challenge, returning the publish.
    ///
    /// The transition to `Accepted` happens when the server's update
    /// arrives with the resulting game id; see [`on_update`].
    ///
    /// [`on_update`]: Self::on_update
    pub fn accept(
        &mut self,
        id: ChallengeId,
    ) -> Result<OutboundPublish, LobbyError> {
        if !self.knows_inbound(id) {
            return Err(LobbyError::UnknownChallenge(id));
        }
        Ok(OutboundPublish {
            destination: Destination::ChallengeAccept,
            body: serde_json::json!({ "challengeId": id }),
        })
    }

    /// Declines a tracked inbound challenge: removes it locally at once,
    /// promotes the next queued challenge, and returns the publish plus
    /// the resulting notices. The caller may ignore the publish outcome
    /// entirely.
    pub fn decline(
        &mut self,
        id: ChallengeId,
    ) -> Result<(OutboundPublish, Vec<LobbyNotice>), LobbyError> {
        if !self.knows_inbound(id) {
            return Err(LobbyError::UnknownChallenge(id));
        }
        self.remove_inbound(id);
        let mut notices = Vec::new();
        self.promote_next(&mut notices);
        let publish = OutboundPublish {
            destination: Destination::ChallengeDecline,
            body: serde_json::json!({ "challengeId": id }),
        };
        Ok((publish, notices))
    }

    /// The accept publish never reached the server: the challenge can't
    /// complete on this connection, so it is treated as expired.
    pub fn on_accept_failed(&mut self, id: ChallengeId) -> Vec<LobbyNotice> {
        if !self.knows_inbound(id) {
            return Vec::new();
        }
        self.remove_inbound(id);
        let mut notices = vec![LobbyNotice::ChallengeResolved {
            id,
            status: ChallengeStatus::Expired,
            game_id: None,
        }];
        self.promote_next(&mut notices);
        notices
    }

    /// A status change arrived on the challenge-updates queue.
    pub fn on_update(&mut self, update: ChallengeUpdate) -> Vec<LobbyNotice> {
        match update.status {
            ChallengeStatus::Pending => {
                // The server acknowledged a challenge we sent and told
                // us its id.
                if self.outgoing.contains_key(&update.id) {
                    return Vec::new();
                }
                let (Some(challenger_id), Some(challenged_id)) =
                    (update.challenger_id, update.challenged_id)
                else {
                    debug!(id = %update.id, "pending update without parties, ignoring");
                    return Vec::new();
                };
                self.outgoing.insert(
                    update.id,
                    Challenge {
                        id: update.id,
                        challenger_id,
                        challenger_name: String::new(),
                        challenged_id,
                        status: ChallengeStatus::Pending,
                    },
                );
                Vec::new()
            }

            ChallengeStatus::Accepted => {
                let known = self.outgoing.remove(&update.id).is_some()
                    || self.knows_inbound(update.id);
                if !known {
                    return Vec::new();
                }
                self.remove_inbound(update.id);

                let mut notices = Vec::new();
                match update.game_id {
                    Some(game_id) => {
                        notices.push(LobbyNotice::ChallengeResolved {
                            id: update.id,
                            status: ChallengeStatus::Accepted,
                            game_id: Some(game_id),
                        });
                        notices.push(LobbyNotice::GameReady {
                            challenge_id: update.id,
                            game_id,
                        });
                    }
                    None => {
                        // Accepted with no game is a broken handshake;
                        // surface it as expiry rather than hanging.
                        debug!(id = %update.id, "accepted update without game id");
                        notices.push(LobbyNotice::ChallengeResolved {
                            id: update.id,
                            status: ChallengeStatus::Expired,
                            game_id: None,
                        });
                    }
                }
                self.promote_next(&mut notices);
                notices
            }

            status @ (ChallengeStatus::Declined
            | ChallengeStatus::Expired) => {
                let known = self.outgoing.remove(&update.id).is_some()
                    || self.knows_inbound(update.id);
                if !known {
                    return Vec::new();
                }
                self.remove_inbound(update.id);
                let mut notices = vec![LobbyNotice::ChallengeResolved {
                    id: update.id,
                    status,
                    game_id: None,
                }];
                self.promote_next(&mut notices);
                notices
            }
        }
    }

    /// Connection loss: every non-terminal challenge is invalidated —
    /// its channel no longer exists.
    pub fn on_disconnect(&mut self) -> Vec<LobbyNotice> {
        let mut notices = Vec::new();
        let expired = self
            .current
            .take()
            .into_iter()
            .chain(self.queued.drain(..))
            .chain(self.outgoing.drain().map(|(_, c)| c));
        for challenge in expired {
            notices.push(LobbyNotice::ChallengeResolved {
                id: challenge.id,
                status: ChallengeStatus::Expired,
                game_id: None,
            });
        }
        notices
    }

    fn knows_inbound(&self, id: ChallengeId) -> bool {
        self.current.as_ref().is_some_and(|c| c.id == id)
            || self.queued.iter().any(|c| c.id == id)
    }

    fn remove_inbound(&mut self, id: ChallengeId) {
        if self.current.as_ref().is_some_and(|c| c.id == id) {
            self.current = None;
        }
        self.queued.retain(|c| c.id != id);
    }

    fn promote_next(&mut self, notices: &mut Vec<LobbyNotice>) {
        if self.current.is_none() {
            if let Some(next) = self.queued.pop_front() {
                self.current = Some(next.clone());
                notices.push(LobbyNotice::ChallengePrompt {
                    challenge: next,
                });
            }
        }
    }
}
