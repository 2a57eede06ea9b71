//! Core protocol types for Tempo's wire format.
//!
//! Everything in this module is either sent over the WebSocket connection
//! or embedded in a request/response payload, so the serde attributes here
//! are load-bearing: the server produces camelCase JSON and addresses the
//! client through string-valued topics, and both sides must agree exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user account.
///
/// Newtype over `u64`; `#[serde(transparent)]` makes it serialize as the
/// plain number, so `UserId(42)` is just `42` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a game (one match between two players).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// A unique identifier for a challenge between two users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub u64);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Chess-facing wire types
// ---------------------------------------------------------------------------

/// The side a player controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The other side.
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// A FEN-equivalent board+state string.
///
/// Opaque to everything in this workspace except the rules engine — the
/// client never parses it, only carries it between the server and the
/// rules engine and compares it for equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fen(pub String);

impl Fen {
    /// The standard starting position.
    pub fn starting() -> Self {
        Self(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
                .to_string(),
        )
    }
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The piece a pawn promotes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Promotion {
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "n")]
    Knight,
}

/// A candidate move in coordinate form (`e2` → `e4`).
///
/// Squares are algebraic coordinates as strings; validity is entirely the
/// rules engine's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
}

impl Move {
    /// A move with no promotion.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Topics — where inbound frames are addressed
// ---------------------------------------------------------------------------

/// A named logical channel multiplexed over the single connection.
///
/// Topics are the keys of the subscription router's handler table: each
/// topic maps to at most one handler, and a frame for a topic nobody
/// subscribed to is dropped. On the wire a topic is its path string
/// (`/topic/game.7`, `/user/queue/challenges`, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Topic {
    /// Authoritative game-state updates for one game.
    Game(GameId),
    /// Chat messages for one game.
    Chat(GameId),
    /// Wholesale presence replacements.
    OnlineUsers,
    /// Challenges addressed to this user.
    Challenges,
    /// Status changes for challenges this user sent or received.
    ChallengeUpdates,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Game(id) => write!(f, "/topic/game.{}", id.0),
            Self::Chat(id) => write!(f, "/topic/chat.{}", id.0),
            Self::OnlineUsers => write!(f, "/topic/online-users"),
            Self::Challenges => write!(f, "/user/queue/challenges"),
            Self::ChallengeUpdates => {
                write!(f, "/user/queue/challenge-updates")
            }
        }
    }
}

impl From<Topic> for String {
    fn from(topic: Topic) -> String {
        topic.to_string()
    }
}

impl TryFrom<String> for Topic {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "/topic/online-users" => return Ok(Self::OnlineUsers),
            "/user/queue/challenges" => return Ok(Self::Challenges),
            "/user/queue/challenge-updates" => {
                return Ok(Self::ChallengeUpdates);
            }
            _ => {}
        }
        if let Some(id) = s.strip_prefix("/topic/game.") {
            let id = id.parse().map_err(|_| format!("bad game topic: {s}"))?;
            return Ok(Self::Game(GameId(id)));
        }
        if let Some(id) = s.strip_prefix("/topic/chat.") {
            let id = id.parse().map_err(|_| format!("bad chat topic: {s}"))?;
            return Ok(Self::Chat(GameId(id)));
        }
        Err(format!("unknown topic: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Destinations — where outbound publishes are addressed
// ---------------------------------------------------------------------------

/// A server-side operation an outbound publish is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Destination {
    /// Submit a move: body is [`MoveSubmission`].
    ChessMove,
    /// Send a chat message: body is [`ChatSend`].
    ChatSend,
    /// Challenge a user: body is `{ "challengedId": … }`.
    ChallengeSend,
    /// Accept a challenge: body is `{ "challengeId": … }`.
    ChallengeAccept,
    /// Decline a challenge: body is `{ "challengeId": … }`.
    ChallengeDecline,
}

impl Destination {
    fn as_str(self) -> &'static str {
        match self {
            Self::ChessMove => "/app/chess.move",
            Self::ChatSend => "/app/chat.sendMessage",
            Self::ChallengeSend => "/app/challenge.send",
            Self::ChallengeAccept => "/app/challenge.accept",
            Self::ChallengeDecline => "/app/challenge.decline",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Destination> for String {
    fn from(d: Destination) -> String {
        d.as_str().to_string()
    }
}

impl TryFrom<String> for Destination {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "/app/chess.move" => Ok(Self::ChessMove),
            "/app/chat.sendMessage" => Ok(Self::ChatSend),
            "/app/challenge.send" => Ok(Self::ChallengeSend),
            "/app/challenge.accept" => Ok(Self::ChallengeAccept),
            "/app/challenge.decline" => Ok(Self::ChallengeDecline),
            _ => Err(format!("unknown destination: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Frames — the top-level wire format
// ---------------------------------------------------------------------------

/// A payload bound for a destination, produced by an engine and routed
/// by whoever composes the engines with the connection — engines never
/// hold the connection themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPublish {
    pub destination: Destination,
    pub body: serde_json::Value,
}

impl OutboundPublish {
    /// The wire frame this publish becomes.
    pub fn into_frame(self) -> ClientFrame {
        ClientFrame::Publish {
            destination: self.destination,
            body: self.body,
        }
    }
}

/// A frame sent from the client to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "Subscribe", "topic": "/topic/game.7" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Arm delivery for a topic on this connection.
    Subscribe { topic: Topic },

    /// Disarm delivery for a topic. A server receiving an `Unsubscribe`
    /// for an unarmed topic ignores it.
    Unsubscribe { topic: Topic },

    /// Publish a payload to a server-side operation.
    Publish {
        destination: Destination,
        body: serde_json::Value,
    },

    /// Keep-alive, sent every few seconds while connected.
    Ping,

    /// Best-effort "going offline" notice sent before an orderly close.
    Bye,
}

/// A frame sent from the server to the client.
///
/// Every inbound frame is addressed to exactly one topic; the body is
/// decoded into a typed payload by whichever engine subscribed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub topic: Topic,
    pub body: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Payloads — typed frame bodies
// ---------------------------------------------------------------------------

/// An event on a game topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum GameEvent {
    /// The server-authoritative position after a confirmed move (ours or
    /// the opponent's). The `fen` wins over any optimistic local copy.
    Update {
        game_id: GameId,
        fen: Fen,
        turn: Color,
    },

    /// The server refused a submitted move.
    MoveRejected { game_id: GameId, reason: String },

    /// A player resigned.
    Resigned { game_id: GameId, winner: Color },
}

/// Body of an outbound move publish: `{ gameId, move, newPosition }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSubmission {
    pub game_id: GameId,
    #[serde(rename = "move")]
    pub mv: Move,
    pub new_position: Fen,
}

/// A chat message delivered on a game's chat topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub game_id: GameId,
    pub sender: String,
    pub content: String,
}

/// Body of an outbound chat publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSend {
    pub game_id: GameId,
    pub content: String,
}

/// An inbound challenge addressed to this user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeNotice {
    pub id: ChallengeId,
    pub challenger_id: UserId,
    pub challenger_name: String,
    pub challenged_id: UserId,
}

/// The lifecycle state of a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    Declined,
    Expired,
}

impl ChallengeStatus {
    /// Whether the challenge can change no further.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Accepted => write!(f, "Accepted"),
            Self::Declined => write!(f, "Declined"),
            Self::Expired => write!(f, "Expired"),
        }
    }
}

/// A status change for a challenge this user sent or received.
///
/// `game_id` is present exactly when `status` is `Accepted`. The party
/// ids are echoed when the server has them — a challenger learns its
/// challenge's assigned id from the first `Pending` update, which must
/// therefore say who it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeUpdate {
    pub id: ChallengeId,
    pub status: ChallengeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<GameId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenger_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenged_id: Option<UserId>,
}

/// One online user, as reported by presence updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDescriptor {
    pub id: UserId,
    pub username: String,
}

// ---------------------------------------------------------------------------
// Request/response error payload
// ---------------------------------------------------------------------------

/// The error payload every non-real-time call returns on failure.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error,
)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
