//! A self-contained demo match: a scripted in-process WebSocket server
//! plays the part of the backend, and a full Tempo client signs in,
//! receives a challenge, accepts it, and plays a move through the
//! optimistic-update/confirmation cycle.
//!
//! Run with `cargo run -p local-match`; set `RUST_LOG=debug` to watch
//! the connection actor work.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use tempo::prelude::*;
use tempo_protocol::{
    ChallengeNotice, ChallengeUpdate, ClientFrame, Destination,
    ServerFrame,
};

const LOCAL: UserId = UserId(1);
const RIVAL: UserId = UserId(2);
const GAME: GameId = GameId(7);

// ---------------------------------------------------------------------------
// Demo rules engine
// ---------------------------------------------------------------------------

/// Positions are `ply:<n>:<side-to-move>` — enough structure to derive
/// the turn owner and advance on every move, with no chess inside.
struct DemoRules;

fn parse(position: &Fen) -> Option<(u64, Color)> {
    let mut parts = position.0.split(':');
    if parts.next()? != "ply" {
        return None;
    }
    let ply = parts.next()?.parse().ok()?;
    let turn = match parts.next()? {
        "white" => Color::White,
        "black" => Color::Black,
        _ => return None,
    };
    Some((ply, turn))
}

impl RulesEngine for DemoRules {
    fn apply_move(&self, position: &Fen, _mv: &Move) -> Option<Fen> {
        let (ply, turn) = parse(position)?;
        Some(Fen(format!("ply:{}:{}", ply + 1, turn.opponent())))
    }

    fn turn_owner(&self, position: &Fen) -> Color {
        parse(position).map(|(_, turn)| turn).unwrap_or(Color::White)
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

// ---------------------------------------------------------------------------
// Demo request/response collaborators
// ---------------------------------------------------------------------------

struct DemoAuthApi;

impl AuthApi for DemoAuthApi {
    async fn sign_in(
        &self,
        username: &str,
        _password: &str,
    ) -> Result<Session, ApiError> {
        use std::time::{SystemTime, UNIX_EPOCH};
        Ok(Session {
            user_id: LOCAL,
            username: username.to_string(),
            roles: vec!["ROLE_USER".into()],
            access_token: "demo-access".into(),
            access_token_expiry: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock after epoch")
                .as_secs()
                + 3600,
            refresh_token: "demo-refresh".into(),
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
        Err(ApiError::new("demo tokens don't refresh"))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

struct DemoGameApi;

impl GameApi for DemoGameApi {
    async fn fetch_game(
        &self,
        game_id: GameId,
    ) -> Result<GameRecord, ApiError> {
        Ok(GameRecord {
            game_id,
            white_id: LOCAL,
            black_id: RIVAL,
            fen: Fen("ply:0:white".into()),
            initial_time: TimeControl::Rapid10.initial().as_secs(),
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

struct DemoLobbyApi;

impl LobbyApi for DemoLobbyApi {
    async fn online_users(
        &self,
    ) -> Result<Vec<UserDescriptor>, ApiError> {
        Ok(vec![UserDescriptor {
            id: RIVAL,
            username: "magnus".into(),
        }])
    }
}

// ---------------------------------------------------------------------------
// Scripted server
// ---------------------------------------------------------------------------

async fn send_frame(
    ws: &mut WebSocketStream<TcpStream>,
    topic: Topic,
    body: serde_json::Value,
) {
    let frame = ServerFrame { topic, body };
    let bytes = serde_json::to_vec(&frame).expect("frame serializes");
    let _ = ws.send(Message::Binary(bytes.into())).await;
}

/// Accepts one client and walks it through: challenge → accept →
/// game → move confirmation.
async fn run_server(listener: TcpListener) {
    let (stream, _) = listener.accept().await.expect("accept");
    let mut ws = tokio_tungstenite::accept_async(stream)
        .await
        .expect("upgrade");
    let mut challenged = false;

    while let Some(msg) = ws.next().await {
        let data = match msg {
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Text(text)) => text.as_bytes().to_vec(),
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };
        let Ok(frame) = serde_json::from_slice::<ClientFrame>(&data)
        else {
            continue;
        };

        match frame {
            ClientFrame::Subscribe {
                topic: Topic::Challenges,
            } if !challenged => {
                challenged = true;
                let notice = ChallengeNotice {
                    id: ChallengeId(1),
                    challenger_id: RIVAL,
                    challenger_name: "magnus".into(),
                    challenged_id: LOCAL,
                };
                send_frame(
                    &mut ws,
                    Topic::Challenges,
                    serde_json::to_value(notice).expect("notice"),
                )
                .await;
            }

            ClientFrame::Publish {
                destination: Destination::ChallengeAccept,
                ..
            } => {
                let update = ChallengeUpdate {
                    id: ChallengeId(1),
                    status: ChallengeStatus::Accepted,
                    game_id: Some(GAME),
                    challenger_id: Some(RIVAL),
                    challenged_id: Some(LOCAL),
                };
                send_frame(
                    &mut ws,
                    Topic::ChallengeUpdates,
                    serde_json::to_value(update).expect("update"),
                )
                .await;
            }

            ClientFrame::Publish {
                destination: Destination::ChessMove,
                body,
            } => {
                let fen = body["newPosition"]
                    .as_str()
                    .unwrap_or("ply:1:black")
                    .to_string();
                send_frame(
                    &mut ws,
                    Topic::Game(GAME),
                    serde_json::json!({
                        "type": "Update",
                        "gameId": GAME,
                        "fen": fen,
                        "turn": "black",
                    }),
                )
                .await;
            }

            ClientFrame::Bye => break,
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind demo server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(run_server(listener));

    let (client, mut events) = ChessClient::new(
        WebSocketTransport::new(format!("ws://{addr}/ws")),
        MemoryStore::new(),
        DemoAuthApi,
        DemoGameApi,
        DemoLobbyApi,
        Arc::new(DemoRules),
        ClientConfig::default(),
    )
    .await
    .expect("client wires up");

    client
        .sign_in("ana", "password")
        .await
        .expect("demo sign-in");
    client.connect().await.expect("demo connect");
    println!("connected as ana");

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Lobby(LobbyNotice::ChallengePrompt {
                challenge,
            }) => {
                println!(
                    "challenge {} from {}",
                    challenge.id, challenge.challenger_name
                );
                client
                    .accept_challenge(challenge.id)
                    .await
                    .expect("accept");
            }

            ClientEvent::Lobby(LobbyNotice::GameReady {
                game_id, ..
            }) => {
                println!("game {game_id} ready, joining as white");
                client.join_game(game_id).await.expect("join");
                client
                    .attempt_move("e2", "e4", None)
                    .await
                    .expect("move");
                println!("played e2e4 (optimistic)");
            }

            ClientEvent::Game(GameNotice::PositionChanged) => {
                let snapshot = client
                    .game_snapshot()
                    .await
                    .expect("active game");
                println!(
                    "server confirmed: position {}, {} to move",
                    snapshot.position, snapshot.turn_owner
                );
                break;
            }

            other => tracing::debug!(?other, "event"),
        }
    }

    client.disconnect().await.expect("disconnect");
    println!("demo complete");
}
