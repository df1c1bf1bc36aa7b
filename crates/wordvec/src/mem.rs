//! In-memory oracle for tests and local experiments.

use std::collections::HashMap;

use crate::{EmbeddingOracle, Pos};

struct Entry {
    vec: Vec<f32>,
    pos: Pos,
    lemma: Option<String>,
}

/// Hand-built vector table. Words without an explicit lemma are their own
/// family.
pub struct MemOracle {
    dim: usize,
    entries: HashMap<String, Entry>,
}

impl MemOracle {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: HashMap::new(),
        }
    }

    pub fn word(mut self, word: &str, vec: Vec<f32>, pos: Pos) -> Self {
        assert_eq!(vec.len(), self.dim, "vector for {word:?} has wrong dim");
        self.entries.insert(
            word.to_string(),
            Entry {
                vec,
                pos,
                lemma: None,
            },
        );
        self
    }

    pub fn variant(mut self, word: &str, vec: Vec<f32>, pos: Pos, lemma: &str) -> Self {
        assert_eq!(vec.len(), self.dim, "vector for {word:?} has wrong dim");
        self.entries.insert(
            word.to_string(),
            Entry {
                vec,
                pos,
                lemma: Some(lemma.to_string()),
            },
        );
        self
    }
}

impl EmbeddingOracle for MemOracle {
    fn dim(&self) -> usize {
        self.dim
    }

    fn vector(&self, word: &str) -> Option<&[f32]> {
        self.entries.get(word).map(|e| e.vec.as_slice())
    }

    fn pos(&self, word: &str) -> Pos {
        self.entries.get(word).map(|e| e.pos).unwrap_or(Pos::Other)
    }

    fn lemma(&self, word: &str) -> String {
        let word = word.to_ascii_lowercase();
        match self.entries.get(&word).and_then(|e| e.lemma.as_deref()) {
            Some(l) => l.to_string(),
            None => word,
        }
    }
}
