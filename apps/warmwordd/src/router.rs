//! Session router: socket ownership, event dispatch, room broadcast.
//!
//! Each connection gets a session id, an unbounded outbound channel, and a
//! writer task that drains the channel onto the socket. Rooms never see
//! sockets; broadcasts resolve session ids to channels here. Sends happen
//! while the room guard is held but never await, so every member observes
//! events in the order the room's lock produced them and the lock is never
//! held across I/O.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use guessproto::{ClientEvent, ServerEvent, SessionId};
use roomcore::room::Room;
use roomcore::vocab::VocabCache;
use roomcore::GuessError;

use crate::AppState;

struct SessionInfo {
    tx: mpsc::UnboundedSender<ServerEvent>,
    /// Rooms this session joined; authoritative for guess/hint routing.
    rooms: HashSet<String>,
}

/// Owns every live socket handle. Rooms hold session ids; sessions hold
/// room ids; this map resolves both directions.
pub struct Sessions {
    inner: Mutex<HashMap<SessionId, SessionInfo>>,
}

impl Sessions {
    pub fn new() -> Sessions {
        Sessions {
            inner: Mutex::new(HashMap::new()),
        }
    }

    fn insert(&self, sid: SessionId, tx: mpsc::UnboundedSender<ServerEvent>) {
        let mut m = self.inner.lock().expect("sessions lock");
        m.insert(
            sid,
            SessionInfo {
                tx,
                rooms: HashSet::new(),
            },
        );
    }

    /// Drop the session, returning the rooms it had joined.
    fn remove(&self, sid: SessionId) -> Option<HashSet<String>> {
        let mut m = self.inner.lock().expect("sessions lock");
        m.remove(&sid).map(|info| info.rooms)
    }

    fn track_room(&self, sid: SessionId, room_id: &str) {
        let mut m = self.inner.lock().expect("sessions lock");
        if let Some(info) = m.get_mut(&sid) {
            info.rooms.insert(room_id.to_string());
        }
    }

    fn in_room(&self, sid: SessionId, room_id: &str) -> bool {
        let m = self.inner.lock().expect("sessions lock");
        m.get(&sid).is_some_and(|info| info.rooms.contains(room_id))
    }

    /// Session-local send. Dead sessions are ignored; the writer task is
    /// the single point that notices a closed socket.
    pub fn send(&self, sid: SessionId, ev: &ServerEvent) {
        let m = self.inner.lock().expect("sessions lock");
        if let Some(info) = m.get(&sid) {
            let _ = info.tx.send(ev.clone());
        }
    }

    /// Room-scoped fan-out in member order.
    pub fn broadcast(&self, sids: &[SessionId], ev: &ServerEvent) {
        let m = self.inner.lock().expect("sessions lock");
        for sid in sids {
            if let Some(info) = m.get(sid) {
                let _ = info.tx.send(ev.clone());
            }
        }
    }
}

impl Default for Sessions {
    fn default() -> Self {
        Self::new()
    }
}

fn new_session_id() -> SessionId {
    let mut b = [0u8; 16];
    getrandom::getrandom(&mut b).expect("getrandom");
    SessionId::from_be_bytes(b)
}

fn guess_error(msg: impl Into<String>) -> ServerEvent {
    ServerEvent::GuessError { msg: msg.into() }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| async move { handle_socket(socket, state).await })
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let sid = new_session_id();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.sessions.insert(sid, tx);

    let writer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let Ok(s) = serde_json::to_string(&ev) else {
                continue;
            };
            if sink.send(Message::Text(s)).await.is_err() {
                break;
            }
        }
    });

    info!(session = %sid, "client connected");

    while let Some(m) = stream.next().await {
        let m = match m {
            Ok(m) => m,
            Err(_) => break,
        };
        match m {
            Message::Text(s) => match serde_json::from_str::<ClientEvent>(&s) {
                Ok(ev) => dispatch(&state, sid, ev).await,
                Err(e) => {
                    warn!(session = %sid, err = %e, "unparseable client event");
                    state.sessions.send(sid, &guess_error("bad event"));
                }
            },
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    disconnect(&state, sid).await;
    // Removing the session dropped its sender; the writer drains and exits.
    let _ = writer.await;
    info!(session = %sid, "client disconnected");
}

async fn dispatch(state: &AppState, sid: SessionId, ev: ClientEvent) {
    match ev {
        ClientEvent::JoinRoom {
            room_id,
            player_name,
            target_word,
        } => join_room(state, sid, room_id, player_name, target_word).await,
        ClientEvent::MakeGuess {
            room_id,
            player_name,
            guess,
        } => make_guess(state, sid, room_id, player_name, guess).await,
        ClientEvent::RequestHint { room_id, .. } => request_hint(state, sid, room_id).await,
    }
}

async fn join_room(
    state: &AppState,
    sid: SessionId,
    room_id: String,
    player_name: String,
    target_word: Option<String>,
) {
    let room_id = room_id.trim().to_ascii_lowercase();
    let player_name = player_name.trim().to_string();
    if room_id.is_empty() || player_name.is_empty() {
        state
            .sessions
            .send(sid, &guess_error("room_id and player_name required"));
        return;
    }

    // The first room ever pays for the vocabulary load; tell the joiner
    // what it is waiting on.
    if state.vocab.get().is_none() {
        state.sessions.send(
            sid,
            &ServerEvent::RoomLoading {
                msg: "loading word vectors...".to_string(),
            },
        );
    }
    let cache = match state
        .vocab
        .ensure_initialized(&state.vocab_cfg, &state.oracle)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "vocabulary cache initialization failed");
            std::process::exit(1);
        }
    };

    let (room, created) = state.registry.get_or_create(&room_id).await;
    state.sessions.track_room(sid, &room_id);

    {
        let mut st = room.lock().await;
        let players = st.join(sid, player_name.clone());
        let (ready, total_words, guesses) = st.snapshot();
        state.sessions.send(
            sid,
            &ServerEvent::RoomState {
                ready,
                total_words,
                guesses,
                players: players.clone(),
            },
        );
        state.sessions.broadcast(
            &st.members(),
            &ServerEvent::PlayerJoined {
                player_name,
                players,
            },
        );
    }

    if created {
        state.sessions.send(
            sid,
            &ServerEvent::RoomLoading {
                msg: "ranking vocabulary against target...".to_string(),
            },
        );
        spawn_build(state.clone(), room, cache, target_word).await;
    }
}

/// Schedule the ranking build off the I/O threads. The join that created the
/// room returns immediately; the task itself announces readiness.
async fn spawn_build(
    state: AppState,
    room: Arc<Room>,
    cache: Arc<VocabCache>,
    requested: Option<String>,
) {
    let handle = tokio::spawn({
        let room = room.clone();
        let state = state.clone();
        async move {
            let oracle = state.oracle.clone();
            let built = tokio::task::spawn_blocking(move || {
                roomcore::ranking::build_for_room(&cache, oracle.as_ref(), requested.as_deref())
            })
            .await;

            // The room may have emptied and been destroyed while we ranked.
            if !state.registry.same_room(&room.id, &room).await {
                info!(room = %room.id, "discarding build result for a dropped room");
                return;
            }

            match built {
                Ok(Ok(ranking)) => {
                    let ranking = Arc::new(ranking);
                    let mut st = room.lock().await;
                    if st.is_empty() {
                        return;
                    }
                    st.attach_ranking(ranking.clone());
                    info!(
                        room = %room.id,
                        total_words = ranking.total_words(),
                        "room ready"
                    );
                    let (ready, total_words, guesses) = st.snapshot();
                    let players = st.players();
                    state.sessions.broadcast(
                        &st.members(),
                        &ServerEvent::RoomState {
                            ready,
                            total_words,
                            guesses,
                            players,
                        },
                    );
                }
                Ok(Err(e)) => {
                    warn!(room = %room.id, err = %e, "room build failed");
                    let st = room.lock().await;
                    state
                        .sessions
                        .broadcast(&st.members(), &guess_error("Could not start the game."));
                    drop(st);
                    state.registry.remove(&room.id).await;
                }
                Err(e) => {
                    warn!(room = %room.id, err = %e, "room build task died");
                    state.registry.remove(&room.id).await;
                }
            }
        }
    });
    room.lock().await.set_init_handle(handle);
}

async fn make_guess(
    state: &AppState,
    sid: SessionId,
    room_id: String,
    player_name: String,
    guess: String,
) {
    let room_id = room_id.trim().to_ascii_lowercase();
    let Some(room) = joined_room(state, sid, &room_id).await else {
        return;
    };

    let mut st = room.lock().await;
    match st.submit_guess(state.oracle.as_ref(), &player_name, &guess) {
        Ok(entry) => {
            state
                .sessions
                .broadcast(&st.members(), &ServerEvent::NewGuess { guess: entry });
        }
        Err(e) => state.sessions.send(sid, &guess_error(e.msg())),
    }
}

async fn request_hint(state: &AppState, sid: SessionId, room_id: String) {
    let room_id = room_id.trim().to_ascii_lowercase();
    let Some(room) = joined_room(state, sid, &room_id).await else {
        return;
    };

    let mut st = room.lock().await;
    match st.request_hint() {
        Ok(entry) => {
            state
                .sessions
                .broadcast(&st.members(), &ServerEvent::NewGuess { guess: entry });
        }
        Err(e) => state.sessions.send(sid, &guess_error(e.msg())),
    }
}

/// Resolve a room the session actually joined, or report the error.
async fn joined_room(state: &AppState, sid: SessionId, room_id: &str) -> Option<Arc<Room>> {
    if !state.sessions.in_room(sid, room_id) {
        state
            .sessions
            .send(sid, &guess_error(GuessError::RoomNotFound.msg()));
        return None;
    }
    match state.registry.get(room_id).await {
        Some(room) => Some(room),
        None => {
            state
                .sessions
                .send(sid, &guess_error(GuessError::RoomNotFound.msg()));
            None
        }
    }
}

async fn disconnect(state: &AppState, sid: SessionId) {
    let Some(rooms) = state.sessions.remove(sid) else {
        return;
    };
    for room_id in rooms {
        let Some(room) = state.registry.get(&room_id).await else {
            continue;
        };
        let empty = {
            let mut st = room.lock().await;
            if let Some((name, players)) = st.leave(sid) {
                state.sessions.broadcast(
                    &st.members(),
                    &ServerEvent::PlayerLeft {
                        player_name: name,
                        players,
                    },
                );
            }
            st.is_empty()
        };
        if empty {
            state.registry.drop_if_empty(&room_id).await;
        }
    }
}
