//! Text tokenization for the index.
//!
//! A term is a maximal run of ASCII letters, lowercased. Every other byte,
//! including anything non-ASCII, acts as a separator. Input is treated as a
//! raw byte stream; no encoding is assumed.

/// Split `text` into terms, preserving document order and duplicates.
pub fn extract_words(text: &[u8]) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for &byte in text {
        if byte.is_ascii_alphabetic() {
            current.push(byte.to_ascii_lowercase() as char);
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// All contiguous byte substrings of `s` of length `n`, sliding by one byte.
///
/// A non-empty string shorter than `n` yields itself; an empty string yields
/// nothing. Duplicates are preserved, callers deduplicate as needed. Index
/// terms are pure ASCII, so the windows always fall on character boundaries;
/// a window that splits a multi-byte character (possible for raw substring
/// queries) is decoded lossily and can never match an indexed gram.
pub fn ngrams(s: &str, n: usize) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    if s.len() < n {
        return vec![s.to_string()];
    }
    s.as_bytes()
        .windows(n)
        .map(|window| String::from_utf8_lossy(window).into_owned())
        .collect()
}
