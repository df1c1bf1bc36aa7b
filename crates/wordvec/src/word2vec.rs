//! Word2vec text-format oracle.
//!
//! Loads a whitespace-separated vector table (`word v1 .. vD` per line, with
//! an optional `count dim` header) and answers the oracle interface from it.
//! Vectors are stored raw; callers that need unit vectors normalize their own
//! copies. Lemmas come from suffix folding gated on "the folded form has a
//! vector"; part-of-speech falls back from an optional lexicon to a built-in
//! closed-class word list.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::lemma;
use crate::{EmbeddingOracle, Pos};

/// Closed-class words: articles, pronouns, prepositions, conjunctions,
/// auxiliaries, particles. These tag as `Other` when no lexicon says better.
const FUNCTION_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "just", "may", "me", "might", "more",
    "most", "must", "my", "no", "nor", "not", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "own", "shall", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours",
];

pub struct Word2VecOracle {
    vectors: HashMap<String, Vec<f32>>,
    dim: usize,
    pos_lexicon: HashMap<String, Pos>,
}

impl Word2VecOracle {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path)
            .with_context(|| format!("open vector table {}", path.display()))?;
        let oracle = Self::from_reader(BufReader::new(f))
            .with_context(|| format!("parse vector table {}", path.display()))?;
        info!(
            words = oracle.vectors.len(),
            dim = oracle.dim,
            "word vectors loaded"
        );
        Ok(oracle)
    }

    pub fn from_reader<R: BufRead>(r: R) -> anyhow::Result<Self> {
        let mut vectors: HashMap<String, Vec<f32>> = HashMap::new();
        let mut dim = 0usize;

        for (lineno, line) in r.lines().enumerate() {
            let line = line.with_context(|| format!("read vector table line {}", lineno + 1))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut it = line.split_ascii_whitespace();
            let Some(word) = it.next() else { continue };
            let rest = it.collect::<Vec<_>>();

            // Optional word2vec header: "<count> <dim>".
            if lineno == 0 && rest.len() == 1 && word.parse::<usize>().is_ok() {
                continue;
            }

            let mut v = Vec::with_capacity(rest.len());
            for tok in &rest {
                let x: f32 = tok
                    .parse()
                    .with_context(|| format!("bad float {tok:?} on line {}", lineno + 1))?;
                v.push(x);
            }
            if v.is_empty() {
                anyhow::bail!("no vector components on line {}", lineno + 1);
            }
            if dim == 0 {
                dim = v.len();
            } else if v.len() != dim {
                anyhow::bail!(
                    "inconsistent dimension on line {}: expected {dim}, got {}",
                    lineno + 1,
                    v.len()
                );
            }
            vectors.insert(word.to_ascii_lowercase(), v);
        }

        anyhow::ensure!(!vectors.is_empty(), "vector table is empty");
        Ok(Self {
            vectors,
            dim,
            pos_lexicon: HashMap::new(),
        })
    }

    /// Attach a `word<TAB>TAG` part-of-speech lexicon. Unknown tags are
    /// skipped; later entries win.
    pub fn with_pos_lexicon(mut self, path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path)
            .with_context(|| format!("open pos lexicon {}", path.display()))?;
        for line in BufReader::new(f).lines() {
            let line = line?;
            let mut it = line.splitn(2, '\t');
            let (Some(word), Some(tag)) = (it.next(), it.next()) else {
                continue;
            };
            if let Some(pos) = Pos::parse(tag) {
                self.pos_lexicon.insert(word.trim().to_ascii_lowercase(), pos);
            }
        }
        info!(entries = self.pos_lexicon.len(), "pos lexicon loaded");
        Ok(self)
    }

    pub fn vector_count(&self) -> usize {
        self.vectors.len()
    }
}

impl EmbeddingOracle for Word2VecOracle {
    fn dim(&self) -> usize {
        self.dim
    }

    fn vector(&self, word: &str) -> Option<&[f32]> {
        self.vectors.get(word).map(|v| v.as_slice())
    }

    fn pos(&self, word: &str) -> Pos {
        if let Some(p) = self.pos_lexicon.get(word) {
            return *p;
        }
        if FUNCTION_WORDS.contains(&word) {
            Pos::Other
        } else {
            Pos::Noun
        }
    }

    fn lemma(&self, word: &str) -> String {
        let word = word.to_ascii_lowercase();
        for cand in lemma::candidates(&word) {
            if self.vectors.contains_key(&cand) {
                return cand;
            }
        }
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(s: &str) -> Word2VecOracle {
        Word2VecOracle::from_reader(Cursor::new(s.as_bytes())).unwrap()
    }

    #[test]
    fn parses_plain_rows() {
        let o = table("cat 1.0 0.0\ndog 0.5 0.5\n");
        assert_eq!(o.dim(), 2);
        assert_eq!(o.vector("cat"), Some(&[1.0, 0.0][..]));
        assert!(o.has_vector("dog"));
        assert!(!o.has_vector("fish"));
    }

    #[test]
    fn skips_word2vec_header() {
        let o = table("2 3\ncat 1 0 0\ndog 0 1 0\n");
        assert_eq!(o.dim(), 3);
        assert_eq!(o.vector_count(), 2);
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = Word2VecOracle::from_reader(Cursor::new(b"cat 1 0\ndog 1\n" as &[u8]));
        assert!(err.is_err());
    }

    #[test]
    fn lemma_folds_only_into_known_words() {
        let o = table("cat 1 0\ncats 0.9 0.1\nrunning 0 1\n");
        // "cats" folds to "cat" because "cat" has a vector.
        assert_eq!(o.lemma("cats"), "cat");
        // "running" would fold to "run", but "run" is not in the table.
        assert_eq!(o.lemma("running"), "running");
        assert_eq!(o.lemma("CAT"), "cat");
    }

    #[test]
    fn function_words_tag_other_without_lexicon() {
        let o = table("the 1 0\ncat 0 1\n");
        assert_eq!(o.pos("the"), Pos::Other);
        assert_eq!(o.pos("cat"), Pos::Noun);
    }
}
