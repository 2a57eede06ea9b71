//! # Tempo
//!
//! Real-time synchronization engine for turn-based online chess.
//!
//! Tempo is the core a chess client is built around: it owns the single
//! live connection to the server, multiplexes the logical event streams
//! (game state, chat, challenges, presence) over it, reconciles
//! optimistic local moves against authoritative server positions, drives
//! the challenge handshake, and keeps the session token fresh — all
//! concurrently with reconnection and the game clock.
//!
//! Rendering, credential storage, HTTP plumbing, and the chess rules
//! themselves are collaborators injected behind traits
//! ([`TokenStore`](tempo_auth::TokenStore), [`AuthApi`](tempo_auth::AuthApi),
//! [`GameApi`](tempo_game::GameApi), [`LobbyApi`](tempo_lobby::LobbyApi),
//! [`RulesEngine`](tempo_game::RulesEngine),
//! [`Transport`](tempo_transport::Transport)).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tempo::prelude::*;
//!
//! let (client, mut events) = ChessClient::new(
//!     WebSocketTransport::new("ws://localhost:8081/ws"),
//!     MemoryStore::new(),
//!     my_auth_api,
//!     my_game_api,
//!     my_lobby_api,
//!     my_rules_engine,
//!     ClientConfig::default(),
//! )
//! .await?;
//!
//! client.sign_in("ana", "hunter2").await?;
//! client.connect().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         ClientEvent::Lobby(LobbyNotice::GameReady { game_id, .. }) => {
//!             client.join_game(game_id).await?;
//!         }
//!         ClientEvent::Game(notice) => { /* re-render the board */ }
//!         _ => {}
//!     }
//! }
//! ```

mod client;
mod error;

pub use client::{ChessClient, ClientEvent};
pub use error::TempoError;

/// The working set for building on Tempo.
pub mod prelude {
    pub use crate::{ChessClient, ClientEvent, TempoError};
    pub use tempo_auth::{
        AuthApi, AuthConfig, MemoryStore, Session, SessionManager,
        TokenGrant, TokenStore,
    };
    pub use tempo_client::{
        BackoffPolicy, ClientConfig, ConnectionState,
    };
    pub use tempo_game::{
        ClockEvent, Clocks, GameApi, GameNotice, GameRecord, GameSession,
        GameStatus, RulesEngine, TimeControl,
    };
    pub use tempo_lobby::{
        Challenge, LobbyApi, LobbyNotice, PresenceSet,
    };
    pub use tempo_protocol::{
        ApiError, ChallengeId, ChallengeStatus, ChatMessage, Color, Fen,
        GameId, Move, Promotion, Topic, UserDescriptor, UserId,
    };
    pub use tempo_transport::{Transport, WebSocketTransport};
}
