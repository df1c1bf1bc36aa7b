//! `wordvec`: word embeddings as an opaque capability.
//!
//! The game never touches a vector table directly. Everything upstream asks
//! four questions: does a word have a vector, what is the vector, what is its
//! coarse part of speech, and which lemma family does it belong to. This crate
//! defines that seam (`EmbeddingOracle`) plus the two adapters we ship: a
//! word2vec text-format loader for production and an in-memory table for
//! tests.

pub mod lemma;
pub mod mem;
pub mod word2vec;

/// Coarse part-of-speech buckets. Anything that is not a content word
/// collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pos {
    Noun,
    Verb,
    Adj,
    Adv,
    Other,
}

impl Pos {
    pub fn parse(s: &str) -> Option<Pos> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOUN" => Some(Pos::Noun),
            "VERB" => Some(Pos::Verb),
            "ADJ" => Some(Pos::Adj),
            "ADV" => Some(Pos::Adv),
            "OTHER" | "X" => Some(Pos::Other),
            _ => None,
        }
    }

    /// Content-bearing tags make target candidates; function words do not.
    pub fn is_content(self) -> bool {
        !matches!(self, Pos::Other)
    }
}

/// Read-only view onto a pretrained word-vector table.
///
/// Implementations must be internally thread-safe; lookups run concurrently
/// from every room.
pub trait EmbeddingOracle: Send + Sync {
    /// Vector dimensionality D. Every vector returned has exactly this length.
    fn dim(&self) -> usize;

    fn vector(&self, word: &str) -> Option<&[f32]>;

    fn has_vector(&self, word: &str) -> bool {
        self.vector(word).is_some()
    }

    fn pos(&self, word: &str) -> Pos;

    /// Stable, case-insensitive family key grouping morphological variants
    /// ("run", "running", "runs" all map to "run").
    fn lemma(&self, word: &str) -> String;
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scale `v` to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let n = l2_norm(v);
    if n > 0.0 {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vectors() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn pos_parse_accepts_known_tags() {
        assert_eq!(Pos::parse("noun"), Some(Pos::Noun));
        assert_eq!(Pos::parse(" VERB "), Some(Pos::Verb));
        assert_eq!(Pos::parse("adj"), Some(Pos::Adj));
        assert_eq!(Pos::parse("propn"), None);
    }
}
