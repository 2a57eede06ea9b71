//! Wire protocol for Tempo.
//!
//! This crate defines the "language" the chess client and its server speak:
//!
//! - **Types** ([`ClientFrame`], [`ServerFrame`], [`Topic`], the typed
//!   payloads) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding or
//!   decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the engines
//! (game, lobby). It knows nothing about connections, sessions, or chess
//! rules — it only knows how messages are shaped and serialized.
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Router (topics) → Engines
//! ```
//!
//! # Addressing model
//!
//! Every inbound frame is addressed to a single [`Topic`]; every outbound
//! publish names a single [`Destination`]. There is exactly one handler per
//! topic at any time, and frames are delivered in the order they arrive on
//! the connection. A typed-envelope model (one socket-wide message enum) is
//! deliberately not offered — mixing the two addressing schemes is how a
//! client ends up double-handling events.

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ApiError, ChallengeId, ChallengeNotice, ChallengeStatus, ChallengeUpdate,
    ChatMessage, ChatSend, ClientFrame, Color, Destination, Fen, GameEvent,
    GameId, Move, MoveSubmission, OutboundPublish, Promotion, ServerFrame,
    Topic, UserDescriptor, UserId,
};
