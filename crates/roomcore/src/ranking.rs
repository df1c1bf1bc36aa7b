//! Per-room ranking engine.
//!
//! Building a room reduces to one matrix-vector product: every cached unit
//! row dotted against the target's unit vector. Rows collapse to one
//! representative per lemma family (the member most similar to the target),
//! and the representatives sort into a dense 1-based ranking. Guesses then
//! resolve in O(1) when their family is ranked, or by counting strictly
//! better entries when it is not.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use guessproto::RankedEntry;
use wordvec::{dot, l2_normalize, EmbeddingOracle};

use crate::vocab::VocabCache;
use crate::GuessError;

/// One family representative in the ranked table.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedWord {
    pub family: String,
    pub word: String,
    pub similarity: f32,
}

/// Immutable output of a room build.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub target_word: String,
    pub target_vec: Vec<f32>,
    /// Sorted by similarity descending; ties by representative word.
    pub ranked: Vec<RankedWord>,
    rank_of_family: HashMap<String, usize>,
}

/// One resolved guess, before it is attributed and logged.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessScore {
    /// Display word: the family representative on the exact path, the
    /// guessed surface on the estimated path.
    pub word: String,
    pub similarity: f32,
    pub rank: usize,
    pub is_correct: bool,
    pub exact: bool,
}

impl Ranking {
    /// Rank the whole cached vocabulary against `target`. Pure CPU, bounded
    /// by the matrix size; callers run it off the I/O threads.
    pub fn build(
        cache: &VocabCache,
        oracle: &dyn EmbeddingOracle,
        target: &str,
    ) -> anyhow::Result<Ranking> {
        let target = target.trim().to_ascii_lowercase();
        let Some(v) = oracle.vector(&target) else {
            anyhow::bail!("target word {target:?} has no vector");
        };
        let mut target_vec = v.to_vec();
        l2_normalize(&mut target_vec);

        // Best (word, similarity) per family.
        let mut best: HashMap<String, (usize, f32)> = HashMap::new();
        for i in 0..cache.vec_count() {
            let sim = dot(cache.row(i), &target_vec);
            let word = &cache.vec_words[i];
            let family = cache.family_key(word).unwrap_or(word.as_str());
            match best.entry(family.to_string()) {
                Entry::Occupied(mut e) => {
                    let (best_i, best_sim) = e.get_mut();
                    let better = sim > *best_sim
                        || (sim == *best_sim && *word < cache.vec_words[*best_i]);
                    if better {
                        *best_i = i;
                        *best_sim = sim;
                    }
                }
                Entry::Vacant(e) => {
                    e.insert((i, sim));
                }
            }
        }

        let mut ranked = best
            .into_iter()
            .map(|(family, (i, similarity))| RankedWord {
                family,
                word: cache.vec_words[i].clone(),
                similarity,
            })
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.word.cmp(&b.word))
        });

        let rank_of_family = ranked
            .iter()
            .enumerate()
            .map(|(i, r)| (r.family.clone(), i + 1))
            .collect::<HashMap<_, _>>();

        Ok(Ranking {
            target_word: target,
            target_vec,
            ranked,
            rank_of_family,
        })
    }

    pub fn total_words(&self) -> usize {
        self.ranked.len()
    }

    pub fn rank_of_family(&self, family: &str) -> Option<usize> {
        self.rank_of_family.get(family).copied()
    }

    /// Score a shape-validated guess. Exact path when the guess's family is
    /// ranked; estimated path (count of strictly closer entries) otherwise.
    pub fn resolve(
        &self,
        oracle: &dyn EmbeddingOracle,
        guess: &str,
    ) -> Result<GuessScore, GuessError> {
        let Some(v) = oracle.vector(guess) else {
            return Err(GuessError::UnknownWord);
        };

        let family = oracle.lemma(guess);
        if let Some(rank) = self.rank_of_family(&family) {
            let rep = &self.ranked[rank - 1];
            return Ok(GuessScore {
                word: rep.word.clone(),
                similarity: rep.similarity,
                rank,
                is_correct: rank == 1,
                exact: true,
            });
        }

        let mut gv = v.to_vec();
        l2_normalize(&mut gv);
        let similarity = dot(&gv, &self.target_vec);
        let rank = 1 + self
            .ranked
            .iter()
            .filter(|r| r.similarity > similarity)
            .count();
        Ok(GuessScore {
            word: guess.to_string(),
            similarity,
            rank,
            is_correct: rank == 1,
            exact: false,
        })
    }

    /// First `n` rows as wire entries.
    pub fn top(&self, n: usize) -> Vec<RankedEntry> {
        self.ranked
            .iter()
            .take(n)
            .enumerate()
            .map(|(i, r)| RankedEntry {
                word: r.word.clone(),
                rank: i + 1,
                similarity: r.similarity,
            })
            .collect()
    }

    /// Pick a hint at half the best rank achieved so far, skipping words
    /// already hinted. Returns the 1-based rank and the representative.
    pub fn pick_hint(
        &self,
        best_rank: Option<usize>,
        hinted: &HashSet<String>,
    ) -> Option<(usize, &RankedWord)> {
        if self.ranked.is_empty() {
            return None;
        }
        let best = best_rank.unwrap_or_else(|| self.total_words());
        let mut r = (best / 2).clamp(1, self.total_words());
        while r > 1 && hinted.contains(&self.ranked[r - 1].word) {
            r -= 1;
        }
        Some((r, &self.ranked[r - 1]))
    }
}

fn rand_index(n: usize) -> usize {
    let mut b = [0u8; 8];
    getrandom::getrandom(&mut b).expect("getrandom");
    (u64::from_be_bytes(b) % n as u64) as usize
}

/// Build a room's ranking. A requested target is used verbatim (and its
/// absence from the vector table is a hard error); otherwise random picks
/// from the meaningful pool retry up to 3 times.
pub fn build_for_room(
    cache: &VocabCache,
    oracle: &dyn EmbeddingOracle,
    requested: Option<&str>,
) -> anyhow::Result<Ranking> {
    if let Some(t) = requested {
        return Ranking::build(cache, oracle, t);
    }

    anyhow::ensure!(
        !cache.meaningful.is_empty(),
        "no meaningful targets in vocabulary"
    );
    let mut last_err = None;
    for _ in 0..3 {
        let t = &cache.meaningful[rand_index(cache.meaningful.len())];
        match Ranking::build(cache, oracle, t) {
            Ok(r) => return Ok(r),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("target selection failed")))
}
