//! End-to-end tests for the `ChessClient` facade with every external
//! collaborator mocked: transport, credential store, auth/game/lobby
//! APIs, and the rules engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use tempo::prelude::*;
use tempo_protocol::{
    ChallengeNotice, ChallengeUpdate, ClientFrame, Destination,
    ServerFrame,
};
use tempo_transport::{Connection, Transport, TransportError};

// =========================================================================
// Mock transport
// =========================================================================

struct ConnInner {
    sent: Mutex<Vec<Vec<u8>>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    closed: AtomicBool,
}

#[derive(Clone)]
struct ConnProbe(Arc<ConnInner>);

impl ConnProbe {
    fn sent_frames(&self) -> Vec<ClientFrame> {
        self.0
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|b| serde_json::from_slice(b).expect("client frame"))
            .collect()
    }

    fn push(&self, topic: Topic, body: serde_json::Value) {
        let bytes =
            serde_json::to_vec(&ServerFrame { topic, body }).unwrap();
        let _ = self.0.inbound_tx.send(bytes);
    }
}

struct MockConnection(Arc<ConnInner>);

impl Connection for MockConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        if self.0.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "closed",
            )));
        }
        self.0.sent.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.0.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.0.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockTransport {
    conns: Arc<Mutex<Vec<ConnProbe>>>,
}

impl MockTransport {
    fn probe(&self, index: usize) -> ConnProbe {
        self.conns.lock().unwrap()[index].clone()
    }
}

impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn connect(
        &self,
        _token: &str,
    ) -> Result<Self::Connection, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(ConnInner {
            sent: Mutex::new(Vec::new()),
            inbound: tokio::sync::Mutex::new(rx),
            inbound_tx: tx,
            closed: AtomicBool::new(false),
        });
        self.conns
            .lock()
            .unwrap()
            .push(ConnProbe(Arc::clone(&inner)));
        Ok(MockConnection(inner))
    }
}

// =========================================================================
// Mock collaborators
// =========================================================================

const LOCAL_USER: UserId = UserId(9);
const OPPONENT: UserId = UserId(5);
const GAME: GameId = GameId(31);

struct FakeAuthApi;

impl AuthApi for FakeAuthApi {
    async fn sign_in(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<Session, ApiError> {
        use std::time::{SystemTime, UNIX_EPOCH};
        Ok(Session {
            user_id: LOCAL_USER,
            username: username.to_string(),
            roles: vec!["ROLE_USER".into()],
            access_token: "tok".into(),
            access_token_expiry: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 24 * 3600,
            refresh_token: "ref".into(),
        })
    }

    async fn sign_up(
        &self,
        _username: &str,
        _email: &str,
        _password: &str,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
    ) -> Result<TokenGrant, ApiError> {
        Err(ApiError::new("not used"))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

struct FakeGameApi;

impl GameApi for FakeGameApi {
    async fn fetch_game(
        &self,
        game_id: GameId,
    ) -> Result<GameRecord, ApiError> {
        Ok(GameRecord {
            game_id,
            white_id: LOCAL_USER,
            black_id: OPPONENT,
            fen: Fen("start".into()),
            initial_time: 600,
        })
    }

    async fn pending_games(&self) -> Result<Vec<GameRecord>, ApiError> {
        Ok(Vec::new())
    }

    async fn end_game(
        &self,
        _game_id: GameId,
        _outcome: &str,
    ) -> Result<(), ApiError> {
        Ok(())
    }
}

struct FakeLobbyApi;

impl LobbyApi for FakeLobbyApi {
    async fn online_users(
        &self,
    ) -> Result<Vec<UserDescriptor>, ApiError> {
        Ok(vec![UserDescriptor {
            id: OPPONENT,
            username: "magnus".into(),
        }])
    }
}

/// Rules scripted per position string, like the game-crate tests.
#[derive(Default)]
struct ScriptedRules {
    legal: HashMap<(String, String), String>,
    turns: HashMap<String, Color>,
}

impl RulesEngine for ScriptedRules {
    fn apply_move(&self, position: &Fen, mv: &Move) -> Option<Fen> {
        self.legal
            .get(&(position.0.clone(), format!("{}{}", mv.from, mv.to)))
            .map(|p| Fen(p.clone()))
    }
    fn turn_owner(&self, position: &Fen) -> Color {
        self.turns
            .get(&position.0)
            .copied()
            .unwrap_or(Color::White)
    }
    fn is_checkmate(&self, _: &Fen) -> bool {
        false
    }
    fn is_stalemate(&self, _: &Fen) -> bool {
        false
    }
    fn is_threefold_repetition(&self, _: &Fen) -> bool {
        false
    }
    fn is_insufficient_material(&self, _: &Fen) -> bool {
        false
    }
    fn is_draw(&self, _: &Fen) -> bool {
        false
    }
}

fn opening_rules() -> Arc<dyn RulesEngine> {
    let mut rules = ScriptedRules::default();
    rules.legal.insert(
        ("start".into(), "e2e4".into()),
        "after-e4".into(),
    );
    rules.turns.insert("start".into(), Color::White);
    rules.turns.insert("after-e4".into(), Color::Black);
    Arc::new(rules)
}

// =========================================================================
// Harness
// =========================================================================

type TestClient =
    ChessClient<MemoryStore, FakeAuthApi, FakeGameApi, FakeLobbyApi>;

async fn connected_client() -> (
    TestClient,
    mpsc::UnboundedReceiver<ClientEvent>,
    MockTransport,
) {
    let transport = MockTransport::default();
    let (client, events) = ChessClient::new(
        transport.clone(),
        MemoryStore::new(),
        FakeAuthApi,
        FakeGameApi,
        FakeLobbyApi,
        opening_rules(),
        ClientConfig::default(),
    )
    .await
    .expect("client builds");

    client.sign_in("ana", "pw").await.expect("sign in");
    client.connect().await.expect("connect");
    (client, events, transport)
}

/// Waits (bounded) for an event matching `pred`, discarding others.
async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event within timeout")
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

fn challenge_notice(id: u64) -> serde_json::Value {
    serde_json::to_value(ChallengeNotice {
        id: ChallengeId(id),
        challenger_id: OPPONENT,
        challenger_name: "magnus".into(),
        challenged_id: LOCAL_USER,
    })
    .unwrap()
}

fn accepted_update(id: u64, game: GameId) -> serde_json::Value {
    serde_json::to_value(ChallengeUpdate {
        id: ChallengeId(id),
        status: ChallengeStatus::Accepted,
        game_id: Some(game),
        challenger_id: Some(OPPONENT),
        challenged_id: Some(LOCAL_USER),
    })
    .unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_connect_arms_lobby_subscriptions() {
    let (_client, _events, transport) = connected_client().await;
    settle().await;

    let topics: Vec<Topic> = transport
        .probe(0)
        .sent_frames()
        .into_iter()
        .filter_map(|f| match f {
            ClientFrame::Subscribe { topic } => Some(topic),
            _ => None,
        })
        .collect();

    for expected in [
        Topic::Challenges,
        Topic::ChallengeUpdates,
        Topic::OnlineUsers,
    ] {
        assert!(
            topics.contains(&expected),
            "missing subscription for {expected:?}"
        );
    }
}

#[tokio::test]
async fn test_challenge_prompt_accept_and_game_ready_flow() {
    let (client, mut events, transport) = connected_client().await;
    let probe = transport.probe(0);

    probe.push(Topic::Challenges, challenge_notice(1));
    let prompt = wait_for(&mut events, |e| {
        matches!(
            e,
            ClientEvent::Lobby(LobbyNotice::ChallengePrompt { .. })
        )
    })
    .await;
    let ClientEvent::Lobby(LobbyNotice::ChallengePrompt { challenge }) =
        prompt
    else {
        unreachable!()
    };
    assert_eq!(challenge.id, ChallengeId(1));
    assert_eq!(challenge.challenger_name, "magnus");

    client
        .accept_challenge(ChallengeId(1))
        .await
        .expect("accept");
    settle().await;
    assert!(probe.sent_frames().iter().any(|f| matches!(
        f,
        ClientFrame::Publish {
            destination: Destination::ChallengeAccept,
            body,
        } if body["challengeId"] == 1
    )));

    probe.push(Topic::ChallengeUpdates, accepted_update(1, GAME));
    let ready = wait_for(&mut events, |e| {
        matches!(e, ClientEvent::Lobby(LobbyNotice::GameReady { .. }))
    })
    .await;
    let ClientEvent::Lobby(LobbyNotice::GameReady { game_id, .. }) = ready
    else {
        unreachable!()
    };
    assert_eq!(game_id, GAME);
}

#[tokio::test]
async fn test_join_game_subscribes_and_move_flow_reconciles() {
    let (client, mut events, transport) = connected_client().await;
    let probe = transport.probe(0);

    client.join_game(GAME).await.expect("join");
    settle().await;

    let frames = probe.sent_frames();
    assert!(frames.iter().any(|f| matches!(
        f,
        ClientFrame::Subscribe { topic: Topic::Game(GAME) }
    )));
    assert!(frames.iter().any(|f| matches!(
        f,
        ClientFrame::Subscribe { topic: Topic::Chat(GAME) }
    )));

    // Local white plays e2e4: optimistic update + submission.
    client
        .attempt_move("e2", "e4", None)
        .await
        .expect("legal move");
    let snapshot = client.game_snapshot().await.expect("active game");
    assert_eq!(snapshot.position, Fen("after-e4".into()));
    assert_eq!(snapshot.turn_owner, Color::Black);
    assert!(snapshot.pending_local_move.is_some());

    settle().await;
    assert!(probe.sent_frames().iter().any(|f| matches!(
        f,
        ClientFrame::Publish {
            destination: Destination::ChessMove,
            body,
        } if body["newPosition"] == "after-e4"
    )));

    // Server confirms; pending clears and it's the opponent's turn.
    probe.push(
        Topic::Game(GAME),
        serde_json::json!({
            "type": "Update",
            "gameId": 31,
            "fen": "after-e4",
            "turn": "black",
        }),
    );
    wait_for(&mut events, |e| {
        matches!(e, ClientEvent::Game(GameNotice::PositionChanged))
    })
    .await;

    let snapshot = client.game_snapshot().await.expect("active game");
    assert!(snapshot.pending_local_move.is_none());
    assert_eq!(snapshot.turn_owner, Color::Black);
}

#[tokio::test]
async fn test_chat_round_trip() {
    let (client, mut events, transport) = connected_client().await;
    let probe = transport.probe(0);
    client.join_game(GAME).await.expect("join");

    client.send_chat("good luck").await.expect("send chat");
    settle().await;
    assert!(probe.sent_frames().iter().any(|f| matches!(
        f,
        ClientFrame::Publish {
            destination: Destination::ChatSend,
            body,
        } if body["content"] == "good luck"
    )));

    probe.push(
        Topic::Chat(GAME),
        serde_json::json!({
            "gameId": 31,
            "sender": "magnus",
            "content": "you too",
        }),
    );
    wait_for(&mut events, |e| matches!(e, ClientEvent::Chat(_))).await;
    let log = client.chat_messages().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sender, "magnus");
}

#[tokio::test]
async fn test_presence_updates_replace_roster() {
    let (client, mut events, transport) = connected_client().await;
    let probe = transport.probe(0);

    probe.push(
        Topic::OnlineUsers,
        serde_json::json!([
            { "id": 5, "username": "magnus" },
            { "id": 6, "username": "judit" },
        ]),
    );
    wait_for(&mut events, |e| matches!(e, ClientEvent::Presence(_)))
        .await;
    assert_eq!(client.online_users().await.len(), 2);

    probe.push(
        Topic::OnlineUsers,
        serde_json::json!([{ "id": 6, "username": "judit" }]),
    );
    wait_for(&mut events, |e| matches!(e, ClientEvent::Presence(_)))
        .await;
    let roster = client.online_users().await;
    assert_eq!(roster.len(), 1, "roster is replaced, not merged");
    assert_eq!(roster[0].username, "judit");
}

#[tokio::test]
async fn test_attempt_move_without_game_fails() {
    let (client, _events, _transport) = connected_client().await;
    let result = client.attempt_move("e2", "e4", None).await;
    assert!(matches!(result, Err(TempoError::NoActiveGame)));
}

#[tokio::test]
async fn test_logout_emits_session_ended_and_disconnects() {
    let (client, mut events, _transport) = connected_client().await;

    client.logout().await;

    wait_for(&mut events, |e| {
        matches!(e, ClientEvent::SessionEnded)
    })
    .await;
    settle().await;
    assert!(!client.connection_state().is_connected());
    assert!(client.session().await.is_none());
}

#[tokio::test]
async fn test_resign_ends_game_locally() {
    let (client, mut events, _transport) = connected_client().await;
    client.join_game(GAME).await.expect("join");

    let status = client.resign().await.expect("resign");

    assert_eq!(
        status,
        GameStatus::Resigned {
            winner: Color::Black
        }
    );
    wait_for(&mut events, |e| {
        matches!(
            e,
            ClientEvent::Game(GameNotice::GameEnded { .. })
        )
    })
    .await;
    let result = client.attempt_move("e2", "e4", None).await;
    assert!(result.is_err(), "no moves after resignation");
}
