//! The connection actor: one task that owns the transport connection.
//!
//! Commands arrive on an mpsc channel from [`ClientHandle`] clones;
//! inbound frames arrive from a per-connection reader task tagged with
//! that connection's [`Epoch`]; the backoff timer and the heartbeat are
//! `select!` branches. Every mutation of connection state, every handler
//! invocation, and every timer consequence happens here, sequentially.
//!
//! The reader task is deliberately dumb: it decodes frames and forwards
//! them. Loss detection, reconnection, and dispatch all stay in the actor
//! where they can see current state — a reader that outlives its
//! connection can only produce events for a burned epoch, which the actor
//! drops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;

use tempo_auth::{AuthApi, SessionManager, TokenStore};
use tempo_protocol::{
    ClientFrame, Codec, Destination, JsonCodec, ServerFrame, Topic,
};
use tempo_transport::{Connection, Transport};

use crate::router::{Dispatch, SubscriptionRouter};
use crate::{
    BackoffPolicy, ClientError, ConnectionState, Epoch, TopicHandler,
};

/// Capacity of the command channel (handle → actor).
const COMMAND_BUFFER: usize = 64;
/// Capacity of the inbound frame channel (reader → actor).
const INBOUND_BUFFER: usize = 256;
/// Stand-in deadline for the backoff branch while no attempt is scheduled.
const IDLE_DEADLINE: Duration = Duration::from_secs(24 * 3600);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning for the connection actor.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Reconnect schedule after transport loss.
    pub backoff: BackoffPolicy,
    /// Keep-alive cadence while connected. Default: 4 seconds.
    pub heartbeat_interval: Duration,
    /// How long an orderly disconnect may spend on the best-effort
    /// goodbye frame before tearing down anyway. Default: 1 second.
    pub bye_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            heartbeat_interval: Duration::from_secs(4),
            bye_grace: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// Commands and handle
// ---------------------------------------------------------------------------

enum Command {
    Connect {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Publish {
        destination: Destination,
        body: serde_json::Value,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Subscribe {
        topic: Topic,
        handler: TopicHandler,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    Unsubscribe {
        topic: Topic,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Handle to the connection actor. Cheap to clone.
///
/// All methods are asynchronous commands; replies travel back on oneshot
/// channels so callers that need the outcome get it without the actor
/// ever blocking on them.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ClientHandle {
    /// Opens the connection using the current session credential.
    ///
    /// # Errors
    /// [`ClientError::NoCredential`] without a live session;
    /// [`ClientError::Transport`] when the dial fails. Also serves as the
    /// manual reconnect out of the Failed state.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { reply: tx })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Manual reconnect after exhausted automatic attempts.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.connect().await
    }

    /// Orderly teardown: best-effort goodbye, close, invalidate every
    /// subscription, no automatic reconnection afterwards.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Disconnect { reply: tx })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Publishes a payload to a destination.
    ///
    /// # Errors
    /// [`ClientError::NotConnected`] outside the Connected state (or
    /// [`ClientError::ConnectionExhausted`] in Failed) — a publish is
    /// never silently dropped.
    pub async fn publish(
        &self,
        destination: Destination,
        body: serde_json::Value,
    ) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Publish {
                destination,
                body,
                reply: tx,
            })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Registers a handler for a topic, replacing any prior one.
    ///
    /// Armed immediately when connected; otherwise remembered and armed
    /// on the next Connected transition.
    pub async fn subscribe(
        &self,
        topic: Topic,
        handler: impl FnMut(serde_json::Value) + Send + 'static,
    ) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe {
                topic,
                handler: Box::new(handler),
                reply: tx,
            })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Removes a topic registration. Idempotent.
    pub async fn unsubscribe(
        &self,
        topic: Topic,
    ) -> Result<(), ClientError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Unsubscribe { topic, reply: tx })
            .await
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Stops the actor entirely. Used at process shutdown.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// The connection state right now.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A watch receiver for observing state transitions (including the
    /// Failed state that signals exhausted reconnection).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

/// Starts the connection actor and returns its handle.
pub fn spawn<T, S, A>(
    transport: T,
    session: SessionManager<S, A>,
    config: ClientConfig,
) -> ClientHandle
where
    T: Transport,
    S: TokenStore,
    A: AuthApi,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let mut config = config;
    config.backoff = config.backoff.clone().validated();

    let actor = ClientActor {
        transport,
        session,
        config,
        codec: JsonCodec,
        router: SubscriptionRouter::new(),
        state_tx,
        inbound_tx,
        conn: None,
        reader: None,
        epoch: Epoch::ZERO,
        attempt: 0,
        backoff_deadline: None,
    };
    tokio::spawn(actor.run(command_rx, inbound_rx));

    ClientHandle {
        commands: command_tx,
        state: state_rx,
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// An event forwarded from a reader task, tagged with the epoch of the
/// connection it was read from.
enum ReaderEvent {
    Frame {
        epoch: Epoch,
        frame: ServerFrame,
    },
    /// The connection ended: cleanly (`error: None`) or not.
    Ended {
        epoch: Epoch,
        error: Option<tempo_transport::TransportError>,
    },
}

struct ClientActor<T: Transport, S: TokenStore, A: AuthApi> {
    transport: T,
    session: SessionManager<S, A>,
    config: ClientConfig,
    codec: JsonCodec,
    router: SubscriptionRouter,
    state_tx: watch::Sender<ConnectionState>,
    inbound_tx: mpsc::Sender<ReaderEvent>,
    conn: Option<Arc<T::Connection>>,
    reader: Option<JoinHandle<()>>,
    /// Epoch of the current connection; burned on every loss or
    /// disconnect so late events can't impersonate a live connection.
    epoch: Epoch,
    /// Reconnect attempt currently scheduled or in flight (0 = none).
    attempt: u32,
    backoff_deadline: Option<TokioInstant>,
}

impl<T: Transport, S: TokenStore, A: AuthApi> ClientActor<T, S, A> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inbound: mpsc::Receiver<ReaderEvent>,
    ) {
        let mut heartbeat =
            tokio::time::interval(self.config.heartbeat_interval);

        loop {
            let backoff_at = self
                .backoff_deadline
                .unwrap_or_else(|| TokioInstant::now() + IDLE_DEADLINE);

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if self.handle_command(cmd).await.is_break() {
                            break;
                        }
                    }
                    // Every handle is gone; nobody can talk to us again.
                    None => break,
                },

                Some(event) = inbound.recv() => {
                    self.handle_reader_event(event);
                }

                _ = tokio::time::sleep_until(backoff_at),
                    if self.backoff_deadline.is_some() =>
                {
                    self.try_reconnect().await;
                }

                _ = heartbeat.tick() => {
                    self.on_heartbeat().await;
                }
            }
        }

        self.teardown(false).await;
        tracing::debug!("connection actor stopped");
    }

    // -- Commands ---------------------------------------------------------

    async fn handle_command(
        &mut self,
        cmd: Command,
    ) -> std::ops::ControlFlow<()> {
        match cmd {
            Command::Connect { reply } => {
                let result = self.do_connect().await;
                let _ = reply.send(result);
            }

            Command::Disconnect { reply } => {
                self.teardown(true).await;
                // The reply is sent only after every subscription is
                // invalidated and the epoch is burned, so a caller that
                // awaited disconnect() can rely on stale confirmations
                // being dropped.
                let _ = reply.send(());
            }

            Command::Publish {
                destination,
                body,
                reply,
            } => {
                let result = match self.current_state() {
                    ConnectionState::Connected { .. } => {
                        let frame = ClientFrame::Publish {
                            destination,
                            body,
                        };
                        match self.send_frame(&frame).await {
                            Ok(()) => Ok(()),
                            Err(e) => {
                                self.begin_loss();
                                Err(e)
                            }
                        }
                    }
                    ConnectionState::Failed => {
                        Err(ClientError::ConnectionExhausted)
                    }
                    _ => Err(ClientError::NotConnected),
                };
                let _ = reply.send(result);
            }

            Command::Subscribe {
                topic,
                handler,
                reply,
            } => {
                let replaced = self.router.insert(topic.clone(), handler);
                if replaced {
                    tracing::debug!(%topic, "subscription handler replaced");
                }
                let result = if self.current_state().is_connected() {
                    match self
                        .send_frame(&ClientFrame::Subscribe {
                            topic: topic.clone(),
                        })
                        .await
                    {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            // Registration stays desired; it will be
                            // armed by the reconnect that follows.
                            self.begin_loss();
                            Err(e)
                        }
                    }
                } else {
                    Ok(())
                };
                let _ = reply.send(result);
            }

            Command::Unsubscribe { topic, reply } => {
                let removed = self.router.remove(&topic);
                if removed && self.current_state().is_connected() {
                    if let Err(e) = self
                        .send_frame(&ClientFrame::Unsubscribe {
                            topic: topic.clone(),
                        })
                        .await
                    {
                        tracing::warn!(%topic, error = %e, "unsubscribe frame failed");
                        self.begin_loss();
                    }
                }
                let _ = reply.send(());
            }

            Command::Shutdown => return std::ops::ControlFlow::Break(()),
        }
        std::ops::ControlFlow::Continue(())
    }

    async fn do_connect(&mut self) -> Result<(), ClientError> {
        if self.current_state().is_connected() {
            return Ok(());
        }
        // A manual connect supersedes any scheduled automatic attempt.
        self.backoff_deadline = None;
        self.attempt = 0;

        let Some(token) = self.session.access_token().await else {
            return Err(ClientError::NoCredential);
        };

        self.set_state(ConnectionState::Connecting);
        match self.transport.connect(&token).await {
            Ok(conn) => {
                self.install_connection(conn).await;
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e.into())
            }
        }
    }

    // -- Inbound ----------------------------------------------------------

    fn handle_reader_event(&mut self, event: ReaderEvent) {
        match event {
            ReaderEvent::Frame { epoch, frame } => {
                let topic = frame.topic.clone();
                match self.router.dispatch(epoch, frame) {
                    Dispatch::Delivered => {
                        tracing::trace!(%topic, %epoch, "frame delivered");
                    }
                    Dispatch::StaleEpoch => {
                        tracing::debug!(
                            %topic, %epoch, current = %self.epoch,
                            "dropping frame from superseded connection"
                        );
                    }
                    Dispatch::NoHandler => {
                        tracing::debug!(%topic, "no handler for topic, dropping");
                    }
                }
            }

            ReaderEvent::Ended { epoch, error } => {
                if epoch != self.epoch
                    || !self.current_state().is_connected()
                {
                    // A reader for a connection we already replaced or
                    // tore down; its obituary is old news.
                    return;
                }
                match error {
                    Some(e) => tracing::warn!(%epoch, error = %e, "connection lost"),
                    None => tracing::warn!(%epoch, "connection closed by server"),
                }
                self.begin_loss();
            }
        }
    }

    // -- Connection lifecycle --------------------------------------------

    async fn install_connection(&mut self, conn: T::Connection) {
        self.epoch = self.epoch.next();
        let conn = Arc::new(conn);
        self.conn = Some(Arc::clone(&conn));
        self.spawn_reader(conn);
        self.attempt = 0;
        self.backoff_deadline = None;
        self.set_state(ConnectionState::Connected { epoch: self.epoch });

        // (Re)establish every currently-desired subscription under the
        // new epoch. Desired, not previously-active: the set may have
        // grown while we were away.
        for topic in self.router.topics() {
            if let Err(e) = self
                .send_frame(&ClientFrame::Subscribe {
                    topic: topic.clone(),
                })
                .await
            {
                tracing::warn!(%topic, error = %e, "arming subscription failed");
                self.begin_loss();
                return;
            }
        }
        self.router.arm(self.epoch);
    }

    fn spawn_reader(&mut self, conn: Arc<T::Connection>) {
        if let Some(old) = self.reader.take() {
            old.abort();
        }
        let epoch = self.epoch;
        let tx = self.inbound_tx.clone();
        let codec = self.codec;

        self.reader = Some(tokio::spawn(async move {
            loop {
                match conn.recv().await {
                    Ok(Some(bytes)) => {
                        match codec.decode::<ServerFrame>(&bytes) {
                            Ok(frame) => {
                                if tx
                                    .send(ReaderEvent::Frame { epoch, frame })
                                    .await
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(
                                    %epoch, error = %e,
                                    "undecodable frame, skipping"
                                );
                            }
                        }
                    }
                    Ok(None) => {
                        let _ = tx
                            .send(ReaderEvent::Ended { epoch, error: None })
                            .await;
                        break;
                    }
                    Err(e) => {
                        let _ = tx
                            .send(ReaderEvent::Ended {
                                epoch,
                                error: Some(e),
                            })
                            .await;
                        break;
                    }
                }
            }
        }));
    }

    /// Unexpected transport loss: invalidate, then schedule the first
    /// backoff attempt. No-op unless currently connected.
    fn begin_loss(&mut self) {
        if !self.current_state().is_connected() {
            return;
        }
        self.conn = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.router.disarm();
        self.epoch = self.epoch.next();

        self.attempt = 1;
        let delay = self.config.backoff.jittered_delay(self.attempt);
        self.backoff_deadline = Some(TokioInstant::now() + delay);
        self.set_state(ConnectionState::Reconnecting {
            attempt: self.attempt,
        });
        tracing::warn!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "reconnecting after connection loss"
        );
    }

    /// A scheduled backoff attempt came due.
    async fn try_reconnect(&mut self) {
        self.backoff_deadline = None;
        if !matches!(
            self.current_state(),
            ConnectionState::Reconnecting { .. }
        ) {
            // State moved on (manual connect/disconnect) after this
            // firing was scheduled; timers don't get a vote anymore.
            return;
        }

        let Some(token) = self.session.access_token().await else {
            tracing::warn!("no credential during reconnect, giving up");
            self.set_state(ConnectionState::Failed);
            return;
        };

        self.set_state(ConnectionState::Connecting);
        match self.transport.connect(&token).await {
            Ok(conn) => {
                tracing::info!(attempt = self.attempt, "reconnected");
                self.install_connection(conn).await;
            }
            Err(e) => {
                if self.config.backoff.exhausted(self.attempt + 1) {
                    tracing::error!(
                        attempts = self.attempt,
                        error = %e,
                        "reconnection attempts exhausted"
                    );
                    self.set_state(ConnectionState::Failed);
                } else {
                    self.attempt += 1;
                    let delay = self
                        .config
                        .backoff
                        .jittered_delay(self.attempt);
                    self.backoff_deadline =
                        Some(TokioInstant::now() + delay);
                    self.set_state(ConnectionState::Reconnecting {
                        attempt: self.attempt,
                    });
                    tracing::warn!(
                        attempt = self.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "reconnect attempt failed"
                    );
                }
            }
        }
    }

    /// Orderly teardown (explicit disconnect or actor shutdown).
    async fn teardown(&mut self, send_bye: bool) {
        self.backoff_deadline = None;
        self.attempt = 0;

        if let Some(conn) = self.conn.take() {
            if send_bye {
                if let Ok(bytes) = self.codec.encode(&ClientFrame::Bye) {
                    let _ = tokio::time::timeout(
                        self.config.bye_grace,
                        conn.send(&bytes),
                    )
                    .await;
                }
            }
            let _ = tokio::time::timeout(
                self.config.bye_grace,
                conn.close(),
            )
            .await;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.router.disarm();
        self.epoch = self.epoch.next();
        self.set_state(ConnectionState::Disconnected);
    }

    // -- Plumbing ---------------------------------------------------------

    async fn on_heartbeat(&mut self) {
        if !self.current_state().is_connected() {
            return;
        }
        if let Err(e) = self.send_frame(&ClientFrame::Ping).await {
            tracing::warn!(error = %e, "heartbeat failed");
            self.begin_loss();
        }
    }

    async fn send_frame(
        &mut self,
        frame: &ClientFrame,
    ) -> Result<(), ClientError> {
        let conn =
            self.conn.as_ref().ok_or(ClientError::NotConnected)?;
        let bytes = self.codec.encode(frame)?;
        conn.send(&bytes).await?;
        Ok(())
    }

    fn current_state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.current_state();
        if prev != next {
            tracing::info!(from = %prev, to = %next, "connection state");
            let _ = self.state_tx.send(next);
        }
    }
}
