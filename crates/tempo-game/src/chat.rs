//! Per-game chat log.

use tempo_protocol::{ChatMessage, GameId};

/// An ordered buffer of chat messages for one game.
///
/// Messages arrive on the game's chat topic in transport order and are
/// appended as-is; the server is the arbiter of ordering. Messages for a
/// different game are ignored (one log per game).
#[derive(Debug, Default)]
pub struct ChatLog {
    game_id: Option<GameId>,
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    /// A log bound to one game.
    pub fn for_game(game_id: GameId) -> Self {
        Self {
            game_id: Some(game_id),
            messages: Vec::new(),
        }
    }

    /// Appends a message. Returns `false` (and drops it) when it belongs
    /// to another game.
    pub fn push(&mut self, message: ChatMessage) -> bool {
        if let Some(expected) = self.game_id {
            if message.game_id != expected {
                return false;
            }
        }
        self.messages.push(message);
        true
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
