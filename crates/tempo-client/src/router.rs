//! The subscription router: a handler table keyed by topic.
//!
//! The router tracks two things separately:
//!
//! - the **desired** set — every `(topic, handler)` registration that is
//!   currently wanted, regardless of connection state;
//! - the **armed** epoch — which connection, if any, the desired set has
//!   been announced to (Subscribe frames sent).
//!
//! Registrations survive connection loss; *armament* does not. On every
//! Connected transition the connection actor re-announces the whole
//! desired set under the new epoch, and frames tagged with any other
//! epoch are dropped here rather than delivered to a handler that
//! belongs to a dead connection's world.

use std::collections::HashMap;

use tempo_protocol::{ServerFrame, Topic};

use crate::Epoch;

/// A registered topic callback.
///
/// Handlers run on the connection actor task, one frame at a time, in
/// transport order. `FnMut` because a handler is typically a closure
/// feeding a channel or mutating an engine behind a lock.
pub type TopicHandler = Box<dyn FnMut(serde_json::Value) + Send>;

/// What became of one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Delivered to the topic's handler.
    Delivered,
    /// The frame's epoch is not the armed one; dropped.
    StaleEpoch,
    /// Nobody subscribed to this topic; dropped.
    NoHandler,
}

/// Demultiplexes inbound frames to at most one handler per topic.
pub struct SubscriptionRouter {
    desired: HashMap<Topic, TopicHandler>,
    armed: Option<Epoch>,
}

impl SubscriptionRouter {
    pub fn new() -> Self {
        Self {
            desired: HashMap::new(),
            armed: None,
        }
    }

    /// Registers a handler, replacing (and releasing) any prior handler
    /// for the same topic. Returns `true` if a prior handler existed.
    pub fn insert(&mut self, topic: Topic, handler: TopicHandler) -> bool {
        self.desired.insert(topic, handler).is_some()
    }

    /// Removes a registration. Returns `true` if one existed. Idempotent.
    pub fn remove(&mut self, topic: &Topic) -> bool {
        self.desired.remove(topic).is_some()
    }

    /// Every currently desired topic.
    pub fn topics(&self) -> Vec<Topic> {
        self.desired.keys().cloned().collect()
    }

    /// Whether a registration exists for the topic.
    pub fn contains(&self, topic: &Topic) -> bool {
        self.desired.contains_key(topic)
    }

    /// Marks the desired set as announced to the connection with the
    /// given epoch.
    pub fn arm(&mut self, epoch: Epoch) {
        self.armed = Some(epoch);
    }

    /// Invalidates armament. Registrations stay desired; no frame will be
    /// delivered until [`arm`](Self::arm) is called for a new epoch.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Whether the desired set is armed under `epoch`.
    pub fn is_armed_for(&self, epoch: Epoch) -> bool {
        self.armed == Some(epoch)
    }

    /// Delivers a frame read under `epoch` to its topic's handler.
    pub fn dispatch(&mut self, epoch: Epoch, frame: ServerFrame) -> Dispatch {
        if !self.is_armed_for(epoch) {
            return Dispatch::StaleEpoch;
        }
        match self.desired.get_mut(&frame.topic) {
            Some(handler) => {
                handler(frame.body);
                Dispatch::Delivered
            }
            None => Dispatch::NoHandler,
        }
    }
}

impl Default for SubscriptionRouter {
    fn default() -> Self {
        Self::new()
    }
}
