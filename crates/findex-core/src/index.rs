//! The inverted index.
//!
//! One reader–writer lock guards all maps: queries take the lock in shared
//! mode, mutations in exclusive mode. No lock is held across file I/O or
//! content tokenization — callers build a [`Document`] first and hand it in
//! fully formed.
//!
//! Postings are sets of document ids, never pointers. A term or n-gram whose
//! posting set drains is pruned from its map, so the maps only ever hold live
//! entries.

use crate::document::Document;
use crate::tokenizer;
use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Queries return at most this many results.
pub const MAX_RESULTS: usize = 10;

/// N-gram width used when none is configured.
pub const DEFAULT_NGRAM_SIZE: usize = 3;

#[derive(Debug, Default)]
struct IndexState {
    documents: AHashMap<u64, Document>,
    path_to_id: AHashMap<PathBuf, u64>,
    term_to_docs: AHashMap<String, AHashSet<u64>>,
    ngram_to_docs: AHashMap<String, AHashSet<u64>>,
}

pub struct InvertedIndex {
    state: RwLock<IndexState>,
    ngram_size: usize,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new(DEFAULT_NGRAM_SIZE)
    }
}

impl InvertedIndex {
    /// `ngram_size` must be at least 1.
    pub fn new(ngram_size: usize) -> Self {
        assert!(ngram_size >= 1, "ngram_size must be at least 1");
        Self {
            state: RwLock::new(IndexState::default()),
            ngram_size,
        }
    }

    pub fn ngram_size(&self) -> usize {
        self.ngram_size
    }

    /// Number of live documents.
    pub fn document_count(&self) -> usize {
        self.state.read().documents.len()
    }

    /// Insert a document, replacing any earlier document with the same path.
    ///
    /// Returns the id the insert displaced, if any, so callers keeping side
    /// tables in sync can drop the stale entry.
    pub fn add(&self, document: Document) -> Option<u64> {
        let id = document.id;
        let mut state = self.state.write();

        let displaced = state.path_to_id.get(&document.path).copied();
        if let Some(old_id) = displaced {
            Self::remove_postings(&mut state, old_id, self.ngram_size);
        }

        state.path_to_id.insert(document.path.clone(), id);
        for term in document.term_frequencies.keys() {
            state
                .term_to_docs
                .entry(term.clone())
                .or_default()
                .insert(id);
            for gram in tokenizer::ngrams(term, self.ngram_size) {
                state.ngram_to_docs.entry(gram).or_default().insert(id);
            }
        }
        debug!(id, path = %document.path.display(), terms = document.term_frequencies.len(), "indexed document");
        state.documents.insert(id, document);

        displaced
    }

    /// Remove the document at `path`. Returns its id, or `None` when the path
    /// is not indexed (in which case nothing changes).
    pub fn remove(&self, path: &Path) -> Option<u64> {
        let mut state = self.state.write();
        let id = state.path_to_id.remove(path)?;
        Self::remove_postings(&mut state, id, self.ngram_size);
        debug!(id, path = %path.display(), "removed document");
        Some(id)
    }

    /// Remove every document directly in `dir` (flat) or lexically under it
    /// (recursive). Returns the removed ids.
    ///
    /// Two-phase on purpose: the matching paths are collected under the
    /// shared lock, then each is removed under its own exclusive acquisition,
    /// so concurrent readers interleave and no iterator outlives a write.
    pub fn remove_in_dir(&self, dir: &Path, recursive: bool) -> Vec<u64> {
        let matching: Vec<PathBuf> = {
            let state = self.state.read();
            state
                .path_to_id
                .keys()
                .filter(|path| {
                    if recursive {
                        path.starts_with(dir)
                    } else {
                        path.parent() == Some(dir)
                    }
                })
                .cloned()
                .collect()
        };

        matching
            .iter()
            .filter_map(|path| self.remove(path))
            .collect()
    }

    /// TF·IDF-ranked search over the union of the query terms' postings.
    ///
    /// Query terms are expected lowercased (callers tokenize). Candidates
    /// scoring zero or below are dropped, the rest sort by score descending
    /// with ids ascending as tie-break, capped at [`MAX_RESULTS`].
    pub fn search(&self, query_terms: &[String]) -> Vec<(u64, f64)> {
        if query_terms.is_empty() {
            return Vec::new();
        }

        let state = self.state.read();
        let total_docs = state.documents.len();

        let mut candidates: AHashSet<u64> = AHashSet::new();
        for term in query_terms {
            if let Some(docs) = state.term_to_docs.get(term) {
                candidates.extend(docs.iter().copied());
            }
        }

        let mut results: Vec<(u64, f64)> = candidates
            .into_iter()
            .filter_map(|id| {
                let score = Self::relevance(&state, id, query_terms, total_docs);
                (score > 0.0).then_some((id, score))
            })
            .collect();

        results.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        results.truncate(MAX_RESULTS);
        results
    }

    /// Substring search via the n-gram postings.
    ///
    /// Conservative filter: every document that literally contains the
    /// lowercased substring is returned, but a document whose terms merely
    /// cover all the n-grams may appear too. Results are ids ascending,
    /// capped at [`MAX_RESULTS`].
    pub fn search_substring(&self, substring: &str) -> Vec<u64> {
        if substring.is_empty() {
            return Vec::new();
        }

        let lowered = substring.to_ascii_lowercase();
        let grams = tokenizer::ngrams(&lowered, self.ngram_size);
        if grams.is_empty() {
            return Vec::new();
        }

        let state = self.state.read();
        let Some(first) = state.ngram_to_docs.get(&grams[0]) else {
            return Vec::new();
        };
        let mut docs: Vec<u64> = first.iter().copied().collect();
        docs.sort_unstable();

        for gram in &grams[1..] {
            let Some(posting) = state.ngram_to_docs.get(gram) else {
                return Vec::new();
            };
            docs.retain(|id| posting.contains(id));
            if docs.is_empty() {
                return Vec::new();
            }
        }

        docs.truncate(MAX_RESULTS);
        docs
    }

    pub fn path_by_id(&self, id: u64) -> Option<PathBuf> {
        self.state.read().documents.get(&id).map(|doc| doc.path.clone())
    }

    pub fn has_document(&self, path: &Path) -> bool {
        self.state.read().path_to_id.contains_key(path)
    }

    /// Snapshot of all live documents, ids ascending.
    pub fn documents(&self) -> Vec<Document> {
        let state = self.state.read();
        let mut docs: Vec<Document> = state.documents.values().cloned().collect();
        docs.sort_unstable_by_key(|doc| doc.id);
        docs
    }

    fn relevance(state: &IndexState, id: u64, query_terms: &[String], total_docs: usize) -> f64 {
        let Some(doc) = state.documents.get(&id) else {
            return 0.0;
        };

        let mut score = 0.0;
        for term in query_terms {
            let Some(&occurrences) = doc.term_frequencies.get(term) else {
                continue;
            };
            let Some(posting) = state.term_to_docs.get(term) else {
                continue;
            };
            let df = posting.len();
            if df == 0 || total_docs == 0 {
                continue;
            }

            let tf = occurrences as f64 / doc.word_count as f64;
            let idf = (total_docs as f64 / df as f64).ln();
            score += tf * idf;
        }
        score
    }

    /// Erase `id` from the document map and every posting it appears in,
    /// pruning keys whose sets drain. `path_to_id` is the caller's to fix up.
    fn remove_postings(state: &mut IndexState, id: u64, ngram_size: usize) {
        let Some(doc) = state.documents.remove(&id) else {
            return;
        };

        for term in doc.term_frequencies.keys() {
            if let Some(docs) = state.term_to_docs.get_mut(term) {
                docs.remove(&id);
                if docs.is_empty() {
                    state.term_to_docs.remove(term);
                }
            }
            for gram in tokenizer::ngrams(term, ngram_size) {
                if let Some(docs) = state.ngram_to_docs.get_mut(&gram) {
                    docs.remove(&id);
                    if docs.is_empty() {
                        state.ngram_to_docs.remove(&gram);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("InvertedIndex")
            .field("documents", &state.documents.len())
            .field("terms", &state.term_to_docs.len())
            .field("ngrams", &state.ngram_to_docs.len())
            .field("ngram_size", &self.ngram_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    impl InvertedIndex {
        /// Cross-map consistency: every posting entry is backed by a live
        /// document and vice versa, and no posting set is empty.
        fn assert_invariants(&self) {
            let state = self.state.read();

            assert_eq!(state.documents.len(), state.path_to_id.len());
            for (&id, doc) in &state.documents {
                assert_eq!(state.path_to_id.get(&doc.path), Some(&id));
                assert_eq!(doc.word_count, doc.term_frequencies.values().sum::<usize>());
                for term in doc.term_frequencies.keys() {
                    assert!(
                        state.term_to_docs[term].contains(&id),
                        "doc {id} missing from posting of term {term:?}"
                    );
                    for gram in tokenizer::ngrams(term, self.ngram_size) {
                        assert!(
                            state.ngram_to_docs[&gram].contains(&id),
                            "doc {id} missing from posting of gram {gram:?}"
                        );
                    }
                }
            }

            for (term, docs) in &state.term_to_docs {
                assert!(!docs.is_empty(), "empty posting kept for term {term:?}");
                for id in docs {
                    let doc = state.documents.get(id).expect("posting points at dead doc");
                    assert!(doc.term_frequencies.contains_key(term));
                }
            }

            for (gram, docs) in &state.ngram_to_docs {
                assert!(!docs.is_empty(), "empty posting kept for gram {gram:?}");
                for id in docs {
                    let doc = state.documents.get(id).expect("gram posting points at dead doc");
                    let backed = doc
                        .term_frequencies
                        .keys()
                        .any(|term| tokenizer::ngrams(term, self.ngram_size).contains(gram));
                    assert!(backed, "gram {gram:?} not derivable from doc {id}");
                }
            }
        }
    }

    fn add(index: &InvertedIndex, id: u64, path: &str, content: &str) -> Option<u64> {
        let doc = Document::build(id, PathBuf::from(path), content.as_bytes())
            .expect("test content must tokenize");
        index.add(doc)
    }

    #[test]
    fn non_discriminating_terms_score_zero() {
        // Both documents contain both terms, so idf = ln(2/2) = 0 and every
        // candidate is dropped.
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "the quick brown fox");
        add(&index, 2, "/b.txt", "quick brown dog");

        let results = index.search(&["quick".into(), "brown".into()]);
        assert!(results.is_empty());
        index.assert_invariants();
    }

    #[test]
    fn discriminating_term_scores_ln_ratio() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "apple");
        add(&index, 2, "/b.txt", "banana");

        let results = index.search(&["apple".into()]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);
        // tf = 1/1, idf = ln(2/1)
        assert!((results[0].1 - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn single_document_index_scores_zero() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "hello world");
        // idf = ln(1/1) = 0
        assert!(index.search(&["hello".into()]).is_empty());
    }

    #[test]
    fn results_sort_by_score_then_id() {
        let index = InvertedIndex::default();
        // "rust" is rarer in /a.txt's short doc than in /b.txt's long one.
        add(&index, 1, "/a.txt", "rust");
        add(&index, 2, "/b.txt", "rust is verbose sometimes maybe");
        add(&index, 3, "/c.txt", "unrelated words entirely");

        let results = index.search(&["rust".into()]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[1].0, 2);
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn equal_scores_tie_break_by_id_ascending() {
        let index = InvertedIndex::default();
        add(&index, 5, "/e.txt", "zebra stripes");
        add(&index, 2, "/b.txt", "zebra stripes");
        add(&index, 9, "/f.txt", "plain horse");

        let results = index.search(&["zebra".into()]);
        assert_eq!(results.iter().map(|r| r.0).collect::<Vec<_>>(), [2, 5]);
        assert!((results[0].1 - results[1].1).abs() < 1e-12);
    }

    #[test]
    fn results_cap_at_ten() {
        let index = InvertedIndex::default();
        for id in 1..=15 {
            add(&index, id, &format!("/doc{id}.txt"), "needle haystack");
        }
        add(&index, 99, "/other.txt", "nothing relevant");

        assert_eq!(index.search(&["needle".into()]).len(), MAX_RESULTS);
        assert_eq!(index.search_substring("needle").len(), MAX_RESULTS);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "something");
        assert!(index.search(&[]).is_empty());
        assert!(index.search_substring("").is_empty());
    }

    #[test]
    fn query_before_any_add_returns_nothing() {
        let index = InvertedIndex::default();
        assert!(index.search(&["anything".into()]).is_empty());
        assert!(index.search_substring("any").is_empty());
    }

    #[test]
    fn substring_filter_is_sound() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "information retrieval");

        assert_eq!(index.search_substring("form"), [1]);
        assert_eq!(index.search_substring("FORM"), [1]);
        assert!(index.search_substring("xyz").is_empty());
    }

    #[test]
    fn substring_shorter_than_ngram_size_matches_via_short_gram() {
        let index = InvertedIndex::new(3);
        add(&index, 1, "/a.txt", "ab cd");
        // "ab" is shorter than the gram width; the term "ab" was itself
        // indexed as a short gram, so the lookup still lands.
        assert_eq!(index.search_substring("ab"), [1]);
    }

    #[test]
    fn substring_filter_admits_cross_term_false_positives() {
        let index = InvertedIndex::default();
        // No term contains "abcdef", but the two terms cover all its grams.
        add(&index, 1, "/a.txt", "xabcd cdefx");
        assert_eq!(index.search_substring("abcdef"), [1]);
    }

    #[test]
    fn replace_on_same_path_retires_old_id() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "hello");
        let displaced = add(&index, 2, "/a.txt", "world");

        assert_eq!(displaced, Some(1));
        assert_eq!(index.document_count(), 1);
        assert!(index.path_by_id(1).is_none());
        assert_eq!(index.path_by_id(2), Some(PathBuf::from("/a.txt")));
        assert!(index.search(&["hello".into()]).is_empty());
        index.assert_invariants();
    }

    #[test]
    fn remove_is_idempotent() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "hello world");

        assert_eq!(index.remove(Path::new("/a.txt")), Some(1));
        index.assert_invariants();
        assert_eq!(index.remove(Path::new("/a.txt")), None);
        index.assert_invariants();
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn remove_prunes_emptied_postings() {
        let index = InvertedIndex::default();
        add(&index, 1, "/a.txt", "unique");
        index.remove(Path::new("/a.txt"));

        let state = index.state.read();
        assert!(state.term_to_docs.is_empty());
        assert!(state.ngram_to_docs.is_empty());
    }

    #[test]
    fn remove_in_dir_flat_spares_subdirectories() {
        let index = InvertedIndex::default();
        add(&index, 1, "/d/a.txt", "alpha");
        add(&index, 2, "/d/sub/b.txt", "beta");
        add(&index, 3, "/d/sub/c.txt", "gamma");

        let removed = index.remove_in_dir(Path::new("/d"), false);
        assert_eq!(removed, [1]);
        assert_eq!(index.document_count(), 2);
        index.assert_invariants();
    }

    #[test]
    fn remove_in_dir_recursive_takes_everything_under() {
        let index = InvertedIndex::default();
        add(&index, 1, "/d/a.txt", "alpha");
        add(&index, 2, "/d/sub/b.txt", "beta");
        add(&index, 3, "/d/sub/c.txt", "gamma");
        add(&index, 4, "/elsewhere/d.txt", "delta");

        let mut removed = index.remove_in_dir(Path::new("/d"), true);
        removed.sort_unstable();
        assert_eq!(removed, [1, 2, 3]);
        assert_eq!(index.document_count(), 1);
        index.assert_invariants();
    }

    #[test]
    fn mixed_case_paths_are_distinct() {
        let index = InvertedIndex::default();
        add(&index, 1, "/Docs/A.txt", "alpha");
        add(&index, 2, "/docs/a.txt", "alpha");
        assert_eq!(index.document_count(), 2);
    }

    #[test]
    fn documents_snapshot_is_sorted_by_id() {
        let index = InvertedIndex::default();
        add(&index, 3, "/c.txt", "three");
        add(&index, 1, "/a.txt", "one");
        add(&index, 2, "/b.txt", "two");

        let ids: Vec<u64> = index.documents().iter().map(|d| d.id).collect();
        assert_eq!(ids, [1, 2, 3]);
    }

    // Randomized add/replace/remove/remove_in_dir churn; the cross-map
    // invariants must hold after every mutation.
    #[test]
    fn invariants_survive_random_churn() {
        const VOCAB: &[&str] = &[
            "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
        ];
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let index = InvertedIndex::default();
        let mut next_id = 1u64;

        for _ in 0..400 {
            match rng.gen_range(0..10) {
                // add or replace
                0..=5 => {
                    let file = rng.gen_range(0..12);
                    let dir = rng.gen_range(0..3);
                    let path = format!("/corpus/d{dir}/f{file}.txt");
                    let words: Vec<&str> = (0..rng.gen_range(1..12))
                        .map(|_| VOCAB[rng.gen_range(0..VOCAB.len())])
                        .collect();
                    if let Some(doc) =
                        Document::build(next_id, PathBuf::from(path), words.join(" ").as_bytes())
                    {
                        index.add(doc);
                        next_id += 1;
                    }
                }
                // remove one path (often absent)
                6..=7 => {
                    let file = rng.gen_range(0..12);
                    let dir = rng.gen_range(0..3);
                    let path = format!("/corpus/d{dir}/f{file}.txt");
                    index.remove(Path::new(&path));
                }
                // flat directory removal
                8 => {
                    let dir = rng.gen_range(0..3);
                    index.remove_in_dir(Path::new(&format!("/corpus/d{dir}")), false);
                }
                // recursive removal of the whole corpus
                _ => {
                    index.remove_in_dir(Path::new("/corpus"), true);
                }
            }
            index.assert_invariants();
        }

        // Queries against whatever survived must stay within bounds.
        let results = index.search(&["alpha".into(), "kappa".into()]);
        assert!(results.len() <= MAX_RESULTS);
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }
}
