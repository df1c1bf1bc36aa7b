//! `roomcore`: the per-room game engine.
//!
//! A process hosts one vocabulary cache and many rooms. Each room ranks the
//! whole vocabulary against its secret target once, up front, and then
//! answers guesses in O(1) for ranked families or O(total_words) for
//! estimated ranks. Rooms hold session ids only; the transport layer owns
//! the sockets and resolves both directions.

pub mod ranking;
pub mod registry;
pub mod room;
pub mod vocab;

pub use ranking::Ranking;
pub use registry::Registry;
pub use room::Room;
pub use vocab::{VocabCache, VocabConfig, VocabOnce};

/// Reasons a guess or hint request is refused. These are session-local:
/// they are reported to the originating client and never alter room state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessError {
    /// Not non-empty lowercase ASCII letters.
    NotAWord,
    /// The oracle has no vector for the word.
    UnknownWord,
    /// The room is still precomputing its ranking.
    NotReady,
    /// Rank 1 was already achieved.
    GameOver,
    /// The room does not exist or the session never joined it.
    RoomNotFound,
}

impl GuessError {
    pub fn msg(self) -> &'static str {
        match self {
            GuessError::NotAWord => "Not a legal guess.",
            GuessError::UnknownWord => "Word not known.",
            GuessError::NotReady => "Game not ready yet.",
            GuessError::GameOver => "Game already won.",
            GuessError::RoomNotFound => "Room not found.",
        }
    }
}

impl std::fmt::Display for GuessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.msg())
    }
}

impl std::error::Error for GuessError {}
