//! One room: membership, guess log, readiness, win state.
//!
//! A room exists from the first join until its last member leaves. All
//! mutation goes through the per-room mutex; the transport layer locks,
//! mutates, pushes the resulting events into per-session channels, and only
//! then releases the guard, so every member observes the lock's order.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;

use guessproto::{GuessEntry, SessionId};
use wordvec::EmbeddingOracle;

use crate::ranking::Ranking;
use crate::GuessError;

/// Reserved author for synthetic hint guesses.
pub const HINT_AUTHOR: &str = "hint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Ranking precomputation is in flight; guesses and hints are refused.
    Initializing,
    Ready,
    /// Rank 1 was achieved; the room is terminal.
    Won,
}

pub struct Room {
    pub id: String,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(id: String) -> Arc<Room> {
        Arc::new(Room {
            id,
            state: Mutex::new(RoomState {
                phase: Phase::Initializing,
                members: Vec::new(),
                guesses: Vec::new(),
                ranking: None,
                hinted: HashSet::new(),
                winner: None,
                init_handle: None,
            }),
        })
    }

    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }
}

pub struct RoomState {
    phase: Phase,
    /// Join order preserved; names may collide, session ids never do.
    members: Vec<(SessionId, String)>,
    guesses: Vec<GuessEntry>,
    ranking: Option<Arc<Ranking>>,
    hinted: HashSet<String>,
    winner: Option<GuessEntry>,
    init_handle: Option<JoinHandle<()>>,
}

impl RoomState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ready(&self) -> bool {
        self.phase != Phase::Initializing
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> Vec<SessionId> {
        self.members.iter().map(|(sid, _)| *sid).collect()
    }

    pub fn players(&self) -> Vec<String> {
        self.members.iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn winner(&self) -> Option<&GuessEntry> {
        self.winner.as_ref()
    }

    pub fn set_init_handle(&mut self, h: JoinHandle<()>) {
        self.init_handle = Some(h);
    }

    pub fn take_init_handle(&mut self) -> Option<JoinHandle<()>> {
        self.init_handle.take()
    }

    /// Add a member; returns the updated player list.
    pub fn join(&mut self, sid: SessionId, name: String) -> Vec<String> {
        if !self.members.iter().any(|(s, _)| *s == sid) {
            self.members.push((sid, name));
        }
        self.players()
    }

    /// Remove a member; returns its name and the updated player list, or
    /// None if the session was not a member.
    pub fn leave(&mut self, sid: SessionId) -> Option<(String, Vec<String>)> {
        let i = self.members.iter().position(|(s, _)| *s == sid)?;
        let (_, name) = self.members.remove(i);
        Some((name, self.players()))
    }

    /// Snapshot for a `room_state` payload.
    pub fn snapshot(&self) -> (bool, usize, Vec<GuessEntry>) {
        let total = self
            .ranking
            .as_ref()
            .map(|r| r.total_words())
            .unwrap_or(0);
        (self.ready(), total, self.guesses.clone())
    }

    /// Attach the finished ranking and flip to Ready.
    pub fn attach_ranking(&mut self, r: Arc<Ranking>) {
        if self.phase == Phase::Initializing {
            self.ranking = Some(r);
            self.phase = Phase::Ready;
        }
    }

    /// Lowest rank achieved so far, hints included.
    pub fn best_rank(&self) -> Option<usize> {
        self.guesses.iter().map(|g| g.rank).min()
    }

    /// Score, log and return one guess. The returned entry is what the room
    /// broadcasts; errors go back to the submitting session only.
    pub fn submit_guess(
        &mut self,
        oracle: &dyn EmbeddingOracle,
        player_name: &str,
        raw: &str,
    ) -> Result<GuessEntry, GuessError> {
        let ranking = self.gate()?;

        let guess = raw.trim();
        if guess.is_empty() || !guess.bytes().all(|b| b.is_ascii_lowercase()) {
            return Err(GuessError::NotAWord);
        }

        let score = ranking.resolve(oracle, guess)?;
        Ok(self.record(&ranking, score, player_name))
    }

    /// Pick and log a hint as a synthetic guess by the reserved author.
    pub fn request_hint(&mut self) -> Result<GuessEntry, GuessError> {
        let ranking = self.gate()?;

        let Some((rank, hint)) = ranking.pick_hint(self.best_rank(), &self.hinted) else {
            return Err(GuessError::NotReady);
        };
        let score = crate::ranking::GuessScore {
            word: hint.word.clone(),
            similarity: hint.similarity,
            rank,
            is_correct: rank == 1,
            exact: true,
        };
        self.hinted.insert(score.word.clone());
        Ok(self.record(&ranking, score, HINT_AUTHOR))
    }

    /// Phase gate shared by guesses and hints.
    fn gate(&self) -> Result<Arc<Ranking>, GuessError> {
        match self.phase {
            Phase::Initializing => Err(GuessError::NotReady),
            Phase::Won => Err(GuessError::GameOver),
            Phase::Ready => self.ranking.clone().ok_or(GuessError::NotReady),
        }
    }

    fn record(
        &mut self,
        ranking: &Ranking,
        score: crate::ranking::GuessScore,
        player_name: &str,
    ) -> GuessEntry {
        // Repeat submissions bump the counter and re-broadcast; they are
        // not progress.
        if let Some(existing) = self.guesses.iter_mut().find(|e| e.word == score.word) {
            existing.times_guessed += 1;
            return existing.clone();
        }

        let mut entry = GuessEntry {
            word: score.word,
            player_name: player_name.to_string(),
            similarity: score.similarity,
            rank: score.rank,
            is_correct: score.is_correct,
            times_guessed: 1,
            top_10: None,
        };
        if entry.is_correct {
            entry.top_10 = Some(ranking.top(10));
            self.phase = Phase::Won;
            self.winner = Some(entry.clone());
        }
        self.guesses.push(entry.clone());
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::Ranking;
    use crate::vocab::{VocabCache, VocabConfig};

    use wordvec::mem::MemOracle;
    use wordvec::Pos;

    fn oracle() -> MemOracle {
        MemOracle::new(3)
            .word("cat", vec![1.0, 0.0, 0.0], Pos::Noun)
            .variant("cats", vec![0.9, 0.1, 0.0], Pos::Noun, "cat")
            .word("dog", vec![0.8, 0.6, 0.0], Pos::Noun)
            .word("bird", vec![0.6, 0.8, 0.0], Pos::Noun)
            .word("fish", vec![0.0, 1.0, 0.0], Pos::Noun)
            .word("run", vec![0.0, 0.0, 1.0], Pos::Verb)
    }

    fn ranking() -> Arc<Ranking> {
        let words = ["cat", "cats", "dog", "bird", "fish", "run"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cfg = VocabConfig {
            min_target_len: 3,
            ..VocabConfig::default()
        };
        let cache = VocabCache::build_from_words(&cfg, &oracle(), words).unwrap();
        Arc::new(Ranking::build(&cache, &oracle(), "cat").unwrap())
    }

    async fn ready_room() -> Arc<Room> {
        let room = Room::new("bacu42".to_string());
        room.lock().await.attach_ranking(ranking());
        room
    }

    #[tokio::test]
    async fn guesses_before_ready_are_refused() {
        let room = Room::new("bacu42".to_string());
        let mut st = room.lock().await;
        st.join(SessionId(1), "alice".to_string());
        assert_eq!(
            st.submit_guess(&oracle(), "alice", "dog"),
            Err(GuessError::NotReady)
        );
        assert_eq!(st.request_hint(), Err(GuessError::NotReady));
    }

    #[tokio::test]
    async fn malformed_guesses_are_refused() {
        let room = ready_room().await;
        let mut st = room.lock().await;
        for bad in ["", "   ", "Dog", "dog1", "two words", "héron"] {
            assert_eq!(
                st.submit_guess(&oracle(), "alice", bad),
                Err(GuessError::NotAWord),
                "guess {bad:?} should be malformed"
            );
        }
        assert!(st.snapshot().2.is_empty());
    }

    #[tokio::test]
    async fn ordinary_guess_is_logged_and_returned() {
        let room = ready_room().await;
        let mut st = room.lock().await;
        let e = st.submit_guess(&oracle(), "alice", "dog").unwrap();
        assert_eq!(e.word, "dog");
        assert_eq!(e.rank, 2);
        assert!(!e.is_correct);
        assert_eq!(e.times_guessed, 1);
        assert_eq!(st.snapshot().2.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_guesses_bump_the_counter_only() {
        let room = ready_room().await;
        let mut st = room.lock().await;
        st.submit_guess(&oracle(), "alice", "dog").unwrap();
        let e = st.submit_guess(&oracle(), "bob", "dog").unwrap();
        assert_eq!(e.times_guessed, 2);
        // Same family, different surface: still the same log entry.
        let e = st.submit_guess(&oracle(), "bob", "cats").unwrap();
        assert_eq!(e.word, "cat");
        assert_eq!(e.times_guessed, 1);
        let distinct = st.snapshot().2;
        assert_eq!(distinct.len(), 2);
        // First guesser keeps the attribution.
        assert_eq!(distinct[0].player_name, "alice");
    }

    #[tokio::test]
    async fn winning_guess_ends_the_game_with_top_10() {
        let room = ready_room().await;
        let mut st = room.lock().await;
        let e = st.submit_guess(&oracle(), "alice", "cat").unwrap();
        assert!(e.is_correct);
        assert_eq!(e.rank, 1);
        let top = e.top_10.expect("winning guess carries top_10");
        assert_eq!(top[0].word, "cat");
        assert_eq!(st.phase(), Phase::Won);
        assert_eq!(st.winner().map(|w| w.word.as_str()), Some("cat"));

        assert_eq!(
            st.submit_guess(&oracle(), "bob", "dog"),
            Err(GuessError::GameOver)
        );
        assert_eq!(st.request_hint(), Err(GuessError::GameOver));
    }

    #[tokio::test]
    async fn hints_halve_and_stay_distinct() {
        let room = ready_room().await;
        let mut st = room.lock().await;
        // Best rank 4 via "fish".
        let e = st.submit_guess(&oracle(), "alice", "fish").unwrap();
        assert_eq!(e.rank, 4);
        let h1 = st.request_hint().unwrap();
        assert_eq!(h1.player_name, HINT_AUTHOR);
        assert_eq!(h1.rank, 2);
        // The hint entered the log, so the next hint halves again.
        let h2 = st.request_hint().unwrap();
        assert!(h2.rank < h1.rank);
        assert_ne!(h1.word, h2.word);
    }

    #[tokio::test]
    async fn membership_tracks_join_order_and_leaves() {
        let room = Room::new("bacu42".to_string());
        let mut st = room.lock().await;
        assert_eq!(st.join(SessionId(1), "alice".to_string()), vec!["alice"]);
        assert_eq!(
            st.join(SessionId(2), "bob".to_string()),
            vec!["alice", "bob"]
        );
        // Name collisions are allowed; sessions stay distinct.
        assert_eq!(
            st.join(SessionId(3), "alice".to_string()),
            vec!["alice", "bob", "alice"]
        );

        let (name, players) = st.leave(SessionId(1)).unwrap();
        assert_eq!(name, "alice");
        assert_eq!(players, vec!["bob", "alice"]);
        assert!(st.leave(SessionId(1)).is_none());
        assert!(!st.is_empty());
        st.leave(SessionId(2));
        st.leave(SessionId(3));
        assert!(st.is_empty());
    }
}
