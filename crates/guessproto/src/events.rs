use serde::{Deserialize, Serialize};

/// One scored guess, as stored in the room log and broadcast to clients.
///
/// `word` is the resolved display word: the family representative when the
/// guess hit the ranked table, the raw surface otherwise. `times_guessed`
/// counts repeat submissions of the same resolved word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessEntry {
    pub word: String,
    pub player_name: String,
    pub similarity: f32,
    pub rank: usize,
    pub is_correct: bool,
    pub times_guessed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_10: Option<Vec<RankedEntry>>,
}

/// One row of the ranked table, surfaced in winning payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub word: String,
    pub rank: usize,
    pub similarity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom {
        room_id: String,
        player_name: String,
        /// Staged rooms can pin the secret; absent means a random target.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_word: Option<String>,
    },
    MakeGuess {
        room_id: String,
        player_name: String,
        guess: String,
    },
    RequestHint {
        room_id: String,
        player_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Progress text while a session waits on heavy setup. Opaque to clients.
    RoomLoading { msg: String },
    RoomState {
        ready: bool,
        total_words: usize,
        guesses: Vec<GuessEntry>,
        players: Vec<String>,
    },
    NewGuess {
        #[serde(flatten)]
        guess: GuessEntry,
    },
    PlayerJoined {
        player_name: String,
        players: Vec<String>,
    },
    PlayerLeft {
        player_name: String,
        players: Vec<String>,
    },
    /// Session-local rejection; never alters room state.
    GuessError { msg: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_guess_serializes_flat() {
        let ev = ServerEvent::NewGuess {
            guess: GuessEntry {
                word: "dog".to_string(),
                player_name: "alice".to_string(),
                similarity: 0.81,
                rank: 23,
                is_correct: false,
                times_guessed: 1,
                top_10: None,
            },
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["event"], "new_guess");
        assert_eq!(v["word"], "dog");
        assert_eq!(v["rank"], 23);
        assert_eq!(v["player_name"], "alice");
        assert!(v.get("top_10").is_none());
        assert!(v.get("guess").is_none());
    }

    #[test]
    fn winning_guess_carries_top_10() {
        let ev = ServerEvent::NewGuess {
            guess: GuessEntry {
                word: "cat".to_string(),
                player_name: "bob".to_string(),
                similarity: 1.0,
                rank: 1,
                is_correct: true,
                times_guessed: 1,
                top_10: Some(vec![RankedEntry {
                    word: "cat".to_string(),
                    rank: 1,
                    similarity: 1.0,
                }]),
            },
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["is_correct"], true);
        assert_eq!(v["top_10"][0]["word"], "cat");
    }

    #[test]
    fn parses_join_room_without_target() {
        let ev: ClientEvent = serde_json::from_str(
            r#"{"event":"join_room","room_id":"bacu42","player_name":"alice"}"#,
        )
        .unwrap();
        match ev {
            ClientEvent::JoinRoom {
                room_id,
                player_name,
                target_word,
            } => {
                assert_eq!(room_id, "bacu42");
                assert_eq!(player_name, "alice");
                assert!(target_word.is_none());
            }
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn parses_make_guess() {
        let ev: ClientEvent = serde_json::from_str(
            r#"{"event":"make_guess","room_id":"bacu42","player_name":"alice","guess":"dog"}"#,
        )
        .unwrap();
        match ev {
            ClientEvent::MakeGuess { guess, .. } => assert_eq!(guess, "dog"),
            other => panic!("wrong event: {other:?}"),
        }
    }

    #[test]
    fn room_state_round_trips() {
        let ev = ServerEvent::RoomState {
            ready: true,
            total_words: 9000,
            guesses: vec![],
            players: vec!["alice".to_string(), "bob".to_string()],
        };
        let s = serde_json::to_string(&ev).unwrap();
        let back: ServerEvent = serde_json::from_str(&s).unwrap();
        match back {
            ServerEvent::RoomState {
                ready,
                total_words,
                players,
                ..
            } => {
                assert!(ready);
                assert_eq!(total_words, 9000);
                assert_eq!(players.len(), 2);
            }
            other => panic!("wrong event: {other:?}"),
        }
    }
}
