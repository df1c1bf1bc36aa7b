//! End-to-end smoke test: boots `warmwordd` on a scratch vocabulary, then
//! plays a scripted two-player round over real WebSockets.
//!
//! Run with both binaries built: `target/debug/e2e_ws`.

use std::process::Stdio;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use guessproto::{ClientEvent, ServerEvent};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BIND: &str = "127.0.0.1:48010";
const ROOM: &str = "bacu42";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("warmword_e2e_{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let vocab = dir.join("vocab.txt");
    let vectors = dir.join("vectors.txt");
    std::fs::write(&vocab, "cat\ncats\ndog\nbird\nfish\nrun\nthe\n")?;
    std::fs::write(
        &vectors,
        "cat 1.0 0.0 0.0\n\
         cats 0.9 0.1 0.0\n\
         dog 0.8 0.6 0.0\n\
         bird 0.6 0.8 0.0\n\
         fish 0.0 1.0 0.0\n\
         run 0.0 0.0 1.0\n\
         the 0.1 0.1 0.1\n",
    )?;

    let mut daemon = Command::new("target/debug/warmwordd")
        .env("WARMWORD_BIND", BIND)
        .env("WARMWORD_VOCAB", &vocab)
        .env("WARMWORD_VECTORS", &vectors)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    wait_tcp(BIND, Duration::from_secs(10)).await?;

    let res = run_round().await;

    let _ = daemon.kill().await;
    let _ = std::fs::remove_dir_all(&dir);
    res
}

async fn wait_tcp(bind: &str, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if TcpStream::connect(bind).await.is_ok() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("timeout waiting for tcp {bind}");
}

async fn connect() -> anyhow::Result<Ws> {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{BIND}/ws")).await?;
    Ok(ws)
}

async fn send(ws: &mut Ws, ev: &ClientEvent) -> anyhow::Result<()> {
    ws.send(Message::Text(serde_json::to_string(ev)?)).await?;
    Ok(())
}

/// Next server event, skipping pings and opaque loading text.
async fn recv(ws: &mut Ws) -> anyhow::Result<ServerEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let m = tokio::time::timeout(remaining, ws.next())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for server event"))?;
        let Some(m) = m else {
            anyhow::bail!("socket closed");
        };
        let Message::Text(s) = m? else { continue };
        match serde_json::from_str::<ServerEvent>(&s)? {
            ServerEvent::RoomLoading { .. } => continue,
            ev => return Ok(ev),
        }
    }
}

async fn recv_ready(ws: &mut Ws) -> anyhow::Result<usize> {
    loop {
        match recv(ws).await? {
            ServerEvent::RoomState {
                ready: true,
                total_words,
                ..
            } => return Ok(total_words),
            ServerEvent::RoomState { ready: false, .. }
            | ServerEvent::PlayerJoined { .. } => continue,
            other => anyhow::bail!("expected room_state, got {other:?}"),
        }
    }
}

async fn run_round() -> anyhow::Result<()> {
    let mut alice = connect().await?;
    send(
        &mut alice,
        &ClientEvent::JoinRoom {
            room_id: ROOM.to_string(),
            player_name: "alice".to_string(),
            target_word: Some("cat".to_string()),
        },
    )
    .await?;
    let total_words = recv_ready(&mut alice).await?;
    anyhow::ensure!(total_words >= 1, "room ready with empty ranking");

    let mut bob = connect().await?;
    send(
        &mut bob,
        &ClientEvent::JoinRoom {
            room_id: ROOM.to_string(),
            player_name: "bob".to_string(),
            target_word: None,
        },
    )
    .await?;
    // Bob sees the ready room immediately; Alice hears the join.
    match recv(&mut bob).await? {
        ServerEvent::RoomState { ready, players, .. } => {
            anyhow::ensure!(ready, "second join saw a not-ready room");
            anyhow::ensure!(players == vec!["alice", "bob"], "players {players:?}");
        }
        other => anyhow::bail!("expected room_state, got {other:?}"),
    }
    match recv(&mut alice).await? {
        ServerEvent::PlayerJoined { player_name, .. } => {
            anyhow::ensure!(player_name == "bob");
        }
        other => anyhow::bail!("expected player_joined, got {other:?}"),
    }
    // Bob also hears his own join broadcast.
    match recv(&mut bob).await? {
        ServerEvent::PlayerJoined { .. } => {}
        other => anyhow::bail!("expected player_joined, got {other:?}"),
    }

    // An ordinary guess fans out to both players.
    send(
        &mut alice,
        &ClientEvent::MakeGuess {
            room_id: ROOM.to_string(),
            player_name: "alice".to_string(),
            guess: "dog".to_string(),
        },
    )
    .await?;
    for ws in [&mut alice, &mut bob] {
        match recv(ws).await? {
            ServerEvent::NewGuess { guess } => {
                anyhow::ensure!(guess.word == "dog");
                anyhow::ensure!(!guess.is_correct);
                anyhow::ensure!(guess.rank > 1);
            }
            other => anyhow::bail!("expected new_guess, got {other:?}"),
        }
    }

    // An unknown word only bothers its guesser.
    send(
        &mut alice,
        &ClientEvent::MakeGuess {
            room_id: ROOM.to_string(),
            player_name: "alice".to_string(),
            guess: "abracadabra".to_string(),
        },
    )
    .await?;
    match recv(&mut alice).await? {
        ServerEvent::GuessError { msg } => anyhow::ensure!(msg == "Word not known."),
        other => anyhow::bail!("expected guess_error, got {other:?}"),
    }

    // Bob wins; everyone gets the top list; the room goes terminal.
    send(
        &mut bob,
        &ClientEvent::MakeGuess {
            room_id: ROOM.to_string(),
            player_name: "bob".to_string(),
            guess: "cat".to_string(),
        },
    )
    .await?;
    for ws in [&mut alice, &mut bob] {
        match recv(ws).await? {
            ServerEvent::NewGuess { guess } => {
                anyhow::ensure!(guess.is_correct);
                anyhow::ensure!(guess.rank == 1);
                anyhow::ensure!(guess.top_10.as_ref().is_some_and(|t| !t.is_empty()));
            }
            other => anyhow::bail!("expected winning new_guess, got {other:?}"),
        }
    }

    send(
        &mut alice,
        &ClientEvent::MakeGuess {
            room_id: ROOM.to_string(),
            player_name: "alice".to_string(),
            guess: "bird".to_string(),
        },
    )
    .await?;
    match recv(&mut alice).await? {
        ServerEvent::GuessError { msg } => anyhow::ensure!(msg == "Game already won."),
        other => anyhow::bail!("expected guess_error, got {other:?}"),
    }

    println!("warmwordd e2e ok");
    Ok(())
}
