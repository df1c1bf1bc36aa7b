//! Process-wide vocabulary cache.
//!
//! Built once, read forever. The cache holds the curated word list, the
//! target-selection pool, a flat row-major matrix of unit-normalized vectors
//! for the words the oracle knows, and the lemma family key of every word.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::OnceCell;
use tracing::info;

use wordvec::{l2_normalize, EmbeddingOracle, Pos};

/// Auxiliary and modal verbs that sneak through content-word tagging but
/// make useless targets.
const FUNCTION_VERBS: &[&str] = &[
    "be", "is", "are", "was", "were", "been", "being", "have", "has", "had", "having", "do",
    "does", "did", "will", "would", "shall", "should", "may", "might", "can", "could", "must",
];

/// Tunables for the one-time vocabulary load.
#[derive(Clone, Debug)]
pub struct VocabConfig {
    pub vocab_path: PathBuf,
    /// Targets are drawn from the first N curated words.
    pub target_pool_size: usize,
    /// Targets shorter than this (or whose lemma is shorter) are skipped.
    pub min_target_len: usize,
    /// Part-of-speech tags eligible as targets.
    pub target_pos: Vec<Pos>,
    /// When set, only the first N curated words feed the ranked matrix.
    pub rank_size: Option<usize>,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            vocab_path: PathBuf::from("vocab.txt"),
            target_pool_size: 2000,
            min_target_len: 4,
            target_pos: vec![Pos::Noun, Pos::Verb, Pos::Adj, Pos::Adv],
            rank_size: None,
        }
    }
}

pub struct VocabCache {
    /// Curated surface words, file order preserved.
    pub words: Vec<String>,
    /// Target-selection pool: content words from the head of `words`.
    pub meaningful: Vec<String>,
    /// Row-major (len(vec_words), dim) matrix; every row unit length.
    vecs: Vec<f32>,
    pub dim: usize,
    /// Surface word for each matrix row.
    pub vec_words: Vec<String>,
    /// Lemma family key for every curated word.
    family: HashMap<String, String>,
}

impl VocabCache {
    pub fn build(cfg: &VocabConfig, oracle: &dyn EmbeddingOracle) -> anyhow::Result<VocabCache> {
        let words = read_word_list(&cfg.vocab_path)
            .with_context(|| format!("load vocabulary {}", cfg.vocab_path.display()))?;
        Self::build_from_words(cfg, oracle, words)
    }

    /// Build from an already-loaded word list. Split out so tests skip the
    /// filesystem.
    pub fn build_from_words(
        cfg: &VocabConfig,
        oracle: &dyn EmbeddingOracle,
        words: Vec<String>,
    ) -> anyhow::Result<VocabCache> {
        anyhow::ensure!(!words.is_empty(), "vocabulary is empty");
        let dim = oracle.dim();
        anyhow::ensure!(dim > 0, "oracle reports zero-dimensional vectors");

        let mut meaningful = Vec::new();
        for w in words.iter().take(cfg.target_pool_size) {
            if !is_meaningful(cfg, oracle, w) {
                continue;
            }
            meaningful.push(w.clone());
        }

        let ranked_words = match cfg.rank_size {
            Some(n) => &words[..n.min(words.len())],
            None => &words[..],
        };

        let mut vecs = Vec::new();
        let mut vec_words = Vec::new();
        for w in ranked_words {
            let Some(v) = oracle.vector(w) else { continue };
            anyhow::ensure!(
                v.len() == dim,
                "oracle returned a {}-dim vector for {w:?}, expected {dim}",
                v.len()
            );
            let mut row = v.to_vec();
            l2_normalize(&mut row);
            vecs.extend_from_slice(&row);
            vec_words.push(w.clone());
        }
        anyhow::ensure!(
            !vec_words.is_empty(),
            "no vocabulary word has a vector; wrong vector table?"
        );

        let mut family = HashMap::with_capacity(words.len());
        for w in &words {
            family.insert(w.clone(), oracle.lemma(w));
        }

        info!(
            words = words.len(),
            with_vectors = vec_words.len(),
            meaningful = meaningful.len(),
            "vocabulary cache built"
        );

        Ok(VocabCache {
            words,
            meaningful,
            vecs,
            dim,
            vec_words,
            family,
        })
    }

    pub fn vec_count(&self) -> usize {
        self.vec_words.len()
    }

    /// Unit-normalized row for `vec_words[i]`.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.vecs[i * self.dim..(i + 1) * self.dim]
    }

    /// Family key of a curated word; absent for out-of-list words.
    pub fn family_key(&self, word: &str) -> Option<&str> {
        self.family.get(word).map(|s| s.as_str())
    }
}

fn is_meaningful(cfg: &VocabConfig, oracle: &dyn EmbeddingOracle, w: &str) -> bool {
    if w.len() < cfg.min_target_len {
        return false;
    }
    if !oracle.has_vector(w) {
        return false;
    }
    if !cfg.target_pos.contains(&oracle.pos(w)) {
        return false;
    }
    if FUNCTION_VERBS.contains(&w) {
        return false;
    }
    // A word whose base form is too short ("days" -> "day") would rank its
    // whole family under a short representative; skip it.
    let lemma = oracle.lemma(w);
    if lemma != w && lemma.len() < cfg.min_target_len {
        return false;
    }
    true
}

fn read_word_list(path: &PathBuf) -> anyhow::Result<Vec<String>> {
    let f = File::open(path)?;
    let mut out = Vec::new();
    for line in BufReader::new(f).lines() {
        let line = line?;
        let w = line.trim();
        if w.is_empty() || !w.bytes().all(|b| b.is_ascii_lowercase()) {
            continue;
        }
        out.push(w.to_string());
    }
    Ok(out)
}

/// One-shot, coalescing gate around the cache build. Exactly one caller
/// performs the work; concurrent callers await the same result.
pub struct VocabOnce {
    cell: OnceCell<Arc<VocabCache>>,
}

impl VocabOnce {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    pub fn get(&self) -> Option<&Arc<VocabCache>> {
        self.cell.get()
    }

    /// Idempotent initialization. The build runs on the blocking pool so the
    /// I/O layer keeps serving other rooms. Errors are returned to every
    /// waiter; the caller decides fatality.
    pub async fn ensure_initialized(
        &self,
        cfg: &VocabConfig,
        oracle: &Arc<dyn EmbeddingOracle>,
    ) -> anyhow::Result<Arc<VocabCache>> {
        let cache = self
            .cell
            .get_or_try_init(|| {
                let cfg = cfg.clone();
                let oracle = oracle.clone();
                async move {
                    let built =
                        tokio::task::spawn_blocking(move || VocabCache::build(&cfg, oracle.as_ref()))
                            .await
                            .context("vocabulary build task died")??;
                    Ok::<_, anyhow::Error>(Arc::new(built))
                }
            })
            .await?;
        Ok(cache.clone())
    }
}

impl Default for VocabOnce {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wordvec::mem::MemOracle;
    use wordvec::Pos;

    fn oracle() -> MemOracle {
        MemOracle::new(3)
            .word("cat", vec![1.0, 0.0, 0.0], Pos::Noun)
            .variant("cats", vec![0.9, 0.1, 0.0], Pos::Noun, "cat")
            .word("dog", vec![0.8, 0.6, 0.0], Pos::Noun)
            .word("bird", vec![0.6, 0.8, 0.0], Pos::Noun)
            .word("fish", vec![0.0, 1.0, 0.0], Pos::Noun)
            .word("the", vec![0.1, 0.1, 0.1], Pos::Other)
            .word("run", vec![0.0, 0.0, 1.0], Pos::Verb)
            .variant("running", vec![0.1, 0.0, 0.99], Pos::Verb, "run")
    }

    fn words() -> Vec<String> {
        ["cat", "cats", "dog", "bird", "fish", "the", "run", "running", "qqqq"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn cfg() -> VocabConfig {
        VocabConfig {
            min_target_len: 3,
            ..VocabConfig::default()
        }
    }

    #[test]
    fn filters_meaningful_pool() {
        let cache = VocabCache::build_from_words(&cfg(), &oracle(), words()).unwrap();
        // "the" is a function word, "qqqq" has no vector.
        assert!(cache.meaningful.contains(&"cat".to_string()));
        assert!(cache.meaningful.contains(&"run".to_string()));
        assert!(!cache.meaningful.contains(&"the".to_string()));
        assert!(!cache.meaningful.contains(&"qqqq".to_string()));
    }

    #[test]
    fn min_length_gates_targets() {
        let cfg = VocabConfig {
            min_target_len: 4,
            ..VocabConfig::default()
        };
        let cache = VocabCache::build_from_words(&cfg, &oracle(), words()).unwrap();
        assert!(!cache.meaningful.contains(&"cat".to_string()));
        assert!(cache.meaningful.contains(&"bird".to_string()));
        // "cats" folds to the too-short "cat".
        assert!(!cache.meaningful.contains(&"cats".to_string()));
    }

    #[test]
    fn rows_are_unit_normalized() {
        let cache = VocabCache::build_from_words(&cfg(), &oracle(), words()).unwrap();
        for i in 0..cache.vec_count() {
            let n = wordvec::l2_norm(cache.row(i));
            assert!((n - 1.0).abs() < 1e-5, "row {i} has norm {n}");
        }
    }

    #[test]
    fn vec_words_excludes_vectorless_entries() {
        let cache = VocabCache::build_from_words(&cfg(), &oracle(), words()).unwrap();
        assert_eq!(cache.vec_count(), 8);
        assert!(!cache.vec_words.contains(&"qqqq".to_string()));
        assert_eq!(cache.family_key("cats"), Some("cat"));
        assert_eq!(cache.family_key("qqqq"), Some("qqqq"));
    }

    #[test]
    fn rank_size_caps_the_matrix() {
        let cfg = VocabConfig {
            min_target_len: 3,
            rank_size: Some(3),
            ..VocabConfig::default()
        };
        let cache = VocabCache::build_from_words(&cfg, &oracle(), words()).unwrap();
        assert_eq!(cache.vec_words, vec!["cat", "cats", "dog"]);
    }

    #[test]
    fn building_twice_is_structurally_identical() {
        let a = VocabCache::build_from_words(&cfg(), &oracle(), words()).unwrap();
        let b = VocabCache::build_from_words(&cfg(), &oracle(), words()).unwrap();
        assert_eq!(a.words, b.words);
        assert_eq!(a.meaningful, b.meaningful);
        assert_eq!(a.vec_words, b.vec_words);
        assert_eq!(a.vecs, b.vecs);
    }

    struct CountingOracle {
        inner: MemOracle,
        dims_asked: AtomicUsize,
    }

    impl EmbeddingOracle for CountingOracle {
        fn dim(&self) -> usize {
            self.dims_asked.fetch_add(1, Ordering::SeqCst);
            self.inner.dim()
        }
        fn vector(&self, word: &str) -> Option<&[f32]> {
            self.inner.vector(word)
        }
        fn pos(&self, word: &str) -> wordvec::Pos {
            self.inner.pos(word)
        }
        fn lemma(&self, word: &str) -> String {
            self.inner.lemma(word)
        }
    }

    #[tokio::test]
    async fn concurrent_initialization_coalesces() {
        let once = VocabOnce::new();
        let counting = Arc::new(CountingOracle {
            inner: oracle(),
            dims_asked: AtomicUsize::new(0),
        });
        let oracle: Arc<dyn EmbeddingOracle> = counting.clone();

        let dir = std::env::temp_dir().join(format!("warmword_vocab_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("vocab.txt");
        std::fs::write(&path, "cat\ncats\ndog\nbird\nfish\nthe\nrun\nrunning\n").unwrap();
        let cfg = VocabConfig {
            vocab_path: path,
            min_target_len: 3,
            ..VocabConfig::default()
        };

        let (a, b) = tokio::join!(
            once.ensure_initialized(&cfg, &oracle),
            once.ensure_initialized(&cfg, &oracle)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        // One build, one dim() probe.
        assert_eq!(counting.dims_asked.load(Ordering::SeqCst), 1);

        let c = once.ensure_initialized(&cfg, &oracle).await.unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
