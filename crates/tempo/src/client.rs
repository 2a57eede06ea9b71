//! The `ChessClient` facade: the composition root that wires the session
//! manager, the connection actor, and the two engines together.
//!
//! This is the only place where the pieces meet. The engines return
//! outbound publishes; the facade routes them through the connection
//! handle. Inbound topic frames are forwarded by the subscription
//! handlers into one internal channel and folded into engine state by a
//! single pump task — so engine mutations stay serialized even though
//! the facade's own methods run on caller tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

use tempo_auth::{
    AuthApi, AuthConfig, AuthError, Session, SessionManager, TokenStore,
};
use tempo_client::{
    spawn, ClientConfig, ClientHandle, ConnectionState,
};
use tempo_game::{
    ChatLog, ClockDriver, ClockEvent, Clocks, GameApi, GameEngine,
    GameNotice, GameRecord, GameSession, GameStatus, RulesEngine,
};
use tempo_lobby::{
    Challenge, ChallengeTracker, LobbyApi, LobbyError, LobbyNotice,
    PresenceSet,
};
use tempo_protocol::{
    ApiError, ChallengeId, ChallengeNotice, ChallengeUpdate, ChatMessage,
    ChatSend, Destination, GameEvent, GameId, Promotion, Topic,
    UserDescriptor, UserId,
};
use tempo_transport::Transport;

use crate::TempoError;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Everything the rendering layer needs to react to, in one stream.
#[derive(Debug)]
pub enum ClientEvent {
    /// The connection state changed (including `Failed` after exhausted
    /// reconnection).
    Connection(ConnectionState),
    /// Something about the active game changed.
    Game(GameNotice),
    /// A clock tick or flag fall.
    Clock(ClockEvent),
    /// A chat message for the active game.
    Chat(ChatMessage),
    /// A challenge prompt or resolution.
    Lobby(LobbyNotice),
    /// The online-users roster was replaced.
    Presence(Vec<UserDescriptor>),
    /// The session ended — logout, or a failed refresh forcing one.
    SessionEnded,
}

/// Raw topic payloads forwarded by the subscription handlers.
enum Inbound {
    Game(serde_json::Value),
    Chat(serde_json::Value),
    Challenge(serde_json::Value),
    ChallengeUpdate(serde_json::Value),
    Presence(serde_json::Value),
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct ActiveGame {
    game_id: GameId,
    engine: Arc<Mutex<GameEngine>>,
    chat: ChatLog,
    /// Aborts its timer task on drop.
    _clock: ClockDriver,
}

struct Shared {
    tracker: ChallengeTracker,
    presence: PresenceSet,
    game: Option<ActiveGame>,
}

// ---------------------------------------------------------------------------
// ChessClient
// ---------------------------------------------------------------------------

/// A connected chess client: session, connection, lobby, and game in one
/// handle.
///
/// Constructed once per process with every external collaborator
/// injected — transport, credential store, the request/response APIs,
/// and the rules engine — so any of them can be substituted in tests.
pub struct ChessClient<S, A, G, L>
where
    S: TokenStore,
    A: AuthApi,
    G: GameApi,
    L: LobbyApi,
{
    session: SessionManager<S, A>,
    handle: ClientHandle,
    rules: Arc<dyn RulesEngine>,
    game_api: G,
    lobby_api: L,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
}

impl<S, A, G, L> ChessClient<S, A, G, L>
where
    S: TokenStore,
    A: AuthApi,
    G: GameApi,
    L: LobbyApi,
{
    /// Wires everything together and returns the client plus its event
    /// stream.
    ///
    /// The lobby-wide subscriptions (challenges, challenge updates,
    /// presence) are registered here; they arm automatically on every
    /// Connected transition.
    pub async fn new<T: Transport>(
        transport: T,
        store: S,
        auth_api: A,
        game_api: G,
        lobby_api: L,
        rules: Arc<dyn RulesEngine>,
        config: ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientEvent>), TempoError>
    {
        let session =
            SessionManager::new(store, auth_api, AuthConfig::default());
        let handle = spawn(transport, session.clone(), config);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared {
            tracker: ChallengeTracker::new(),
            presence: PresenceSet::new(),
            game: None,
        }));

        let tx = inbound_tx.clone();
        handle
            .subscribe(Topic::Challenges, move |body| {
                let _ = tx.send(Inbound::Challenge(body));
            })
            .await?;
        let tx = inbound_tx.clone();
        handle
            .subscribe(Topic::ChallengeUpdates, move |body| {
                let _ = tx.send(Inbound::ChallengeUpdate(body));
            })
            .await?;
        let tx = inbound_tx.clone();
        handle
            .subscribe(Topic::OnlineUsers, move |body| {
                let _ = tx.send(Inbound::Presence(body));
            })
            .await?;

        tokio::spawn(pump(
            inbound_rx,
            Arc::clone(&shared),
            event_tx.clone(),
            session.changes(),
            handle.watch_state(),
            handle.clone(),
        ));

        Ok((
            Self {
                session,
                handle,
                rules,
                game_api,
                lobby_api,
                shared,
                events: event_tx,
                inbound_tx,
            },
            event_rx,
        ))
    }

    // -- Session ----------------------------------------------------------

    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), TempoError> {
        Ok(self.session.sign_up(username, email, password).await?)
    }

    pub async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Session, TempoError> {
        Ok(self.session.sign_in(username, password).await?)
    }

    /// Loads a persisted session, if the store has one.
    pub async fn restore_session(
        &self,
    ) -> Result<Option<Session>, TempoError> {
        Ok(self.session.restore().await?)
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.session().await
    }

    /// Disconnects and ends the session (best-effort server notice).
    pub async fn logout(&self) {
        let _ = self.disconnect().await;
        self.session.logout().await;
    }

    // -- Connection -------------------------------------------------------

    pub async fn connect(&self) -> Result<(), TempoError> {
        Ok(self.handle.connect().await?)
    }

    /// Manual reconnect after exhausted automatic attempts.
    pub async fn reconnect(&self) -> Result<(), TempoError> {
        Ok(self.handle.reconnect().await?)
    }

    /// Orderly disconnect. Every pending challenge and optimistic move
    /// is invalidated before the transport goes down, so a confirmation
    /// still in flight can't land afterwards.
    pub async fn disconnect(&self) -> Result<(), TempoError> {
        {
            let mut shared = self.shared.lock().await;
            let notices = shared.tracker.on_disconnect();
            forward_lobby(notices, &self.events);
            if let Some(active) = &shared.game {
                active.engine.lock().await.invalidate_pending();
            }
        }
        self.handle.disconnect().await?;
        Ok(())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.handle.watch_state()
    }

    // -- Lobby ------------------------------------------------------------

    /// Challenges another user.
    pub async fn challenge(&self, user: UserId) -> Result<(), TempoError> {
        let publish = self.shared.lock().await.tracker.send(user);
        self.handle
            .publish(publish.destination, publish.body)
            .await?;
        Ok(())
    }

    /// Accepts an inbound challenge. The resulting game id arrives as a
    /// [`LobbyNotice::GameReady`] event; pass it to
    /// [`join_game`](Self::join_game) to establish the game
    /// subscriptions.
    pub async fn accept_challenge(
        &self,
        id: ChallengeId,
    ) -> Result<(), TempoError> {
        let publish = self.shared.lock().await.tracker.accept(id)?;
        if let Err(e) = self
            .handle
            .publish(publish.destination, publish.body)
            .await
        {
            let notices =
                self.shared.lock().await.tracker.on_accept_failed(id);
            forward_lobby(notices, &self.events);
            return Err(
                LobbyError::ChallengeFailed(e.to_string()).into()
            );
        }
        Ok(())
    }

    /// Declines an inbound challenge. The prompt is gone the moment this
    /// returns; the network outcome is fire-and-forget.
    pub async fn decline_challenge(
        &self,
        id: ChallengeId,
    ) -> Result<(), TempoError> {
        let (publish, notices) =
            self.shared.lock().await.tracker.decline(id)?;
        forward_lobby(notices, &self.events);
        if let Err(e) = self
            .handle
            .publish(publish.destination, publish.body)
            .await
        {
            debug!(error = %e, "decline frame not delivered");
        }
        Ok(())
    }

    pub async fn pending_challenge(&self) -> Option<Challenge> {
        self.shared.lock().await.tracker.current().cloned()
    }

    /// The last presence roster received on the connection.
    pub async fn online_users(&self) -> Vec<UserDescriptor> {
        self.shared.lock().await.presence.users().to_vec()
    }

    /// Fetches the roster over the request/response API (first paint,
    /// or fallback while disconnected) and adopts it.
    pub async fn refresh_online_users(
        &self,
    ) -> Result<Vec<UserDescriptor>, TempoError> {
        let users = self.lobby_api.online_users().await?;
        self.shared
            .lock()
            .await
            .presence
            .replace_all(users.clone());
        let _ = self.events.send(ClientEvent::Presence(users.clone()));
        Ok(users)
    }

    pub async fn pending_games(
        &self,
    ) -> Result<Vec<GameRecord>, TempoError> {
        Ok(self.game_api.pending_games().await?)
    }

    // -- Game -------------------------------------------------------------

    /// Establishes the subscriptions and clock for a game, typically in
    /// response to [`LobbyNotice::GameReady`].
    pub async fn join_game(
        &self,
        game_id: GameId,
    ) -> Result<(), TempoError> {
        let session = self
            .session
            .session()
            .await
            .ok_or(AuthError::NoSession)
            .map_err(TempoError::from)?;
        let record = self.game_api.fetch_game(game_id).await?;
        let color = record.color_of(session.user_id).ok_or_else(|| {
            TempoError::Api(ApiError::new(
                "current user is not a player in this game",
            ))
        })?;

        let mut game_session = GameSession::new(
            game_id,
            color,
            Clocks::new(Duration::from_secs(record.initial_time)),
        );
        game_session.turn_owner = self.rules.turn_owner(&record.fen);
        game_session.position = record.fen;

        let mut engine =
            GameEngine::new(game_session, Arc::clone(&self.rules));
        // Both players exist by the time a game record does.
        engine.start();
        let engine = Arc::new(Mutex::new(engine));

        let (clock_tx, mut clock_rx) = mpsc::channel(8);
        let driver = ClockDriver::spawn(Arc::clone(&engine), clock_tx);
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(event) = clock_rx.recv().await {
                let _ = events.send(ClientEvent::Clock(event));
            }
        });

        let tx = self.inbound_tx.clone();
        self.handle
            .subscribe(Topic::Game(game_id), move |body| {
                let _ = tx.send(Inbound::Game(body));
            })
            .await?;
        let tx = self.inbound_tx.clone();
        self.handle
            .subscribe(Topic::Chat(game_id), move |body| {
                let _ = tx.send(Inbound::Chat(body));
            })
            .await?;

        let previous = self.shared.lock().await.game.replace(ActiveGame {
            game_id,
            engine,
            chat: ChatLog::for_game(game_id),
            _clock: driver,
        });
        if let Some(previous) = previous {
            if previous.game_id != game_id {
                let _ = self
                    .handle
                    .unsubscribe(Topic::Game(previous.game_id))
                    .await;
                let _ = self
                    .handle
                    .unsubscribe(Topic::Chat(previous.game_id))
                    .await;
            }
        }
        Ok(())
    }

    /// Drops the active game and its subscriptions.
    pub async fn leave_game(&self) {
        let previous = self.shared.lock().await.game.take();
        if let Some(previous) = previous {
            let _ = self
                .handle
                .unsubscribe(Topic::Game(previous.game_id))
                .await;
            let _ = self
                .handle
                .unsubscribe(Topic::Chat(previous.game_id))
                .await;
        }
    }

    /// Attempts a move in the active game: optimistic board update, then
    /// submission. A submission that can't be sent is rolled back before
    /// this returns.
    pub async fn attempt_move(
        &self,
        from: &str,
        to: &str,
        promotion: Option<Promotion>,
    ) -> Result<(), TempoError> {
        let publish = {
            let shared = self.shared.lock().await;
            let active =
                shared.game.as_ref().ok_or(TempoError::NoActiveGame)?;
            active
                .engine
                .lock()
                .await
                .attempt_move(from, to, promotion)?
        };

        if let Err(e) = self
            .handle
            .publish(publish.destination, publish.body)
            .await
        {
            warn!(error = %e, "move submission failed, rolling back");
            let shared = self.shared.lock().await;
            if let Some(active) = &shared.game {
                return Err(active
                    .engine
                    .lock()
                    .await
                    .on_submit_failed()
                    .into());
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Sends a chat message on the active game's chat topic.
    pub async fn send_chat(
        &self,
        content: &str,
    ) -> Result<(), TempoError> {
        let game_id = {
            let shared = self.shared.lock().await;
            shared
                .game
                .as_ref()
                .ok_or(TempoError::NoActiveGame)?
                .game_id
        };
        let body = serde_json::to_value(ChatSend {
            game_id,
            content: content.to_string(),
        })
        .expect("chat payload serializes to JSON");
        self.handle.publish(Destination::ChatSend, body).await?;
        Ok(())
    }

    /// Resigns the active game: ends it locally at once, then notifies
    /// the server best-effort.
    pub async fn resign(&self) -> Result<GameStatus, TempoError> {
        let (game_id, status) = {
            let shared = self.shared.lock().await;
            let active =
                shared.game.as_ref().ok_or(TempoError::NoActiveGame)?;
            let status = active.engine.lock().await.resign_local();
            (active.game_id, status)
        };
        let _ = self
            .events
            .send(ClientEvent::Game(GameNotice::GameEnded { status }));
        if let Err(e) =
            self.game_api.end_game(game_id, &status.to_string()).await
        {
            debug!(error = %e, "resign notification failed");
        }
        Ok(status)
    }

    /// A snapshot of the active game's session, for rendering.
    pub async fn game_snapshot(&self) -> Option<GameSession> {
        let shared = self.shared.lock().await;
        match &shared.game {
            Some(active) => {
                Some(active.engine.lock().await.session().clone())
            }
            None => None,
        }
    }

    /// The active game's chat log, for rendering.
    pub async fn chat_messages(&self) -> Vec<ChatMessage> {
        let shared = self.shared.lock().await;
        match &shared.game {
            Some(active) => active.chat.messages().to_vec(),
            None => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

fn forward_lobby(
    notices: Vec<LobbyNotice>,
    events: &mpsc::UnboundedSender<ClientEvent>,
) {
    for notice in notices {
        let _ = events.send(ClientEvent::Lobby(notice));
    }
}

/// Folds inbound frames, connection transitions, and session changes
/// into engine state, one at a time.
async fn pump(
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::UnboundedSender<ClientEvent>,
    mut session_changes: watch::Receiver<Option<Session>>,
    mut conn_state: watch::Receiver<ConnectionState>,
    handle: ClientHandle,
) {
    let mut last_state = *conn_state.borrow();
    loop {
        tokio::select! {
            msg = inbound.recv() => match msg {
                Some(msg) => {
                    handle_inbound(msg, &shared, &events).await;
                }
                None => break,
            },

            changed = conn_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *conn_state.borrow_and_update();
                let lost = last_state.is_connected()
                    && !state.is_connected();
                last_state = state;
                let _ = events.send(ClientEvent::Connection(state));
                if lost {
                    invalidate_on_loss(&shared, &events).await;
                }
            },

            changed = session_changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let ended =
                    session_changes.borrow_and_update().is_none();
                if ended {
                    // Forced logout (or an ordinary one): the
                    // connection has no credential to live on.
                    let _ = events.send(ClientEvent::SessionEnded);
                    let _ = handle.disconnect().await;
                }
            },
        }
    }
    debug!("client event pump stopped");
}

async fn handle_inbound(
    msg: Inbound,
    shared: &Arc<Mutex<Shared>>,
    events: &mpsc::UnboundedSender<ClientEvent>,
) {
    match msg {
        Inbound::Challenge(body) => {
            match serde_json::from_value::<ChallengeNotice>(body) {
                Ok(notice) => {
                    let notices =
                        shared.lock().await.tracker.on_notice(notice);
                    forward_lobby(notices, events);
                }
                Err(e) => debug!(error = %e, "bad challenge payload"),
            }
        }

        Inbound::ChallengeUpdate(body) => {
            match serde_json::from_value::<ChallengeUpdate>(body) {
                Ok(update) => {
                    let notices =
                        shared.lock().await.tracker.on_update(update);
                    forward_lobby(notices, events);
                }
                Err(e) => {
                    debug!(error = %e, "bad challenge update payload");
                }
            }
        }

        Inbound::Presence(body) => {
            match serde_json::from_value::<Vec<UserDescriptor>>(body) {
                Ok(users) => {
                    shared
                        .lock()
                        .await
                        .presence
                        .replace_all(users.clone());
                    let _ =
                        events.send(ClientEvent::Presence(users));
                }
                Err(e) => debug!(error = %e, "bad presence payload"),
            }
        }

        Inbound::Game(body) => {
            match serde_json::from_value::<GameEvent>(body) {
                Ok(event) => {
                    let shared = shared.lock().await;
                    if let Some(active) = &shared.game {
                        let notices = active
                            .engine
                            .lock()
                            .await
                            .handle_event(event);
                        for notice in notices {
                            let _ = events
                                .send(ClientEvent::Game(notice));
                        }
                    }
                }
                Err(e) => debug!(error = %e, "bad game payload"),
            }
        }

        Inbound::Chat(body) => {
            match serde_json::from_value::<ChatMessage>(body) {
                Ok(message) => {
                    let mut shared = shared.lock().await;
                    if let Some(active) = &mut shared.game {
                        if active.chat.push(message.clone()) {
                            let _ = events
                                .send(ClientEvent::Chat(message));
                        }
                    }
                }
                Err(e) => debug!(error = %e, "bad chat payload"),
            }
        }
    }
}

/// The connection left Connected: pending challenges and optimistic
/// moves belong to a dead epoch.
async fn invalidate_on_loss(
    shared: &Arc<Mutex<Shared>>,
    events: &mpsc::UnboundedSender<ClientEvent>,
) {
    let mut shared = shared.lock().await;
    let notices = shared.tracker.on_disconnect();
    forward_lobby(notices, events);
    if let Some(active) = &shared.game {
        active.engine.lock().await.invalidate_pending();
    }
}
