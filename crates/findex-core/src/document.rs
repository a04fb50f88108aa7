use crate::tokenizer;
use ahash::AHashMap;
use std::path::PathBuf;

/// One indexed file.
///
/// The path is the external identity (unique among live documents); the id is
/// internal, allocated once at ingestion and never reused.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: u64,
    pub path: PathBuf,
    /// Total number of word tokens, not unique terms.
    pub word_count: usize,
    /// Term → occurrence count. `word_count` equals the sum of the values.
    pub term_frequencies: AHashMap<String, usize>,
}

impl Document {
    /// Tokenize `content` and build a document.
    ///
    /// Returns `None` when the content yields no words; such files are never
    /// recorded and the id the caller allocated simply stays unused.
    pub fn build(id: u64, path: PathBuf, content: &[u8]) -> Option<Self> {
        let words = tokenizer::extract_words(content);
        if words.is_empty() {
            return None;
        }

        let word_count = words.len();
        let mut term_frequencies = AHashMap::new();
        for word in words {
            *term_frequencies.entry(word).or_insert(0) += 1;
        }

        Some(Self {
            id,
            path,
            word_count,
            term_frequencies,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_frequencies() {
        let doc = Document::build(1, PathBuf::from("/a.txt"), b"the cat and the hat").unwrap();
        assert_eq!(doc.word_count, 5);
        assert_eq!(doc.term_frequencies["the"], 2);
        assert_eq!(doc.term_frequencies["cat"], 1);
        assert_eq!(doc.term_frequencies.len(), 4);
    }

    #[test]
    fn word_count_is_sum_of_frequencies() {
        let doc = Document::build(1, PathBuf::from("/a.txt"), b"a b a c b a").unwrap();
        assert_eq!(doc.word_count, doc.term_frequencies.values().sum::<usize>());
    }

    #[test]
    fn wordless_content_builds_nothing() {
        assert!(Document::build(1, PathBuf::from("/a.txt"), b"12345 !@#").is_none());
        assert!(Document::build(1, PathBuf::from("/a.txt"), b"").is_none());
    }
}
