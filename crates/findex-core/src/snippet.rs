//! Query-centered snippet extraction.
//!
//! Picks the densest window of the document around the query words and
//! returns the original text it spans. Snippet words are alphanumeric runs,
//! wider than index terms, so numbers survive into previews.

/// Window size used when callers have no opinion.
pub const DEFAULT_MAX_WORDS: usize = 30;

const MAX_SNIPPET_BYTES: usize = 300;

/// Extract a preview of `content` of at most `max_words` words covering as
/// many of `query_words` as possible with the smallest span.
///
/// Returns `"..."` when there is nothing to show: empty content or query, or
/// no query word occurring in the content. Snippets longer than 300 bytes are
/// cut at the last whitespace before the cap, with `"..."` appended.
pub fn extract(content: &str, query_words: &[String], max_words: usize) -> String {
    if content.is_empty() || query_words.is_empty() || max_words == 0 {
        return "...".to_string();
    }

    let bytes = content.as_bytes();
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_alphanumeric() {
            let start = i;
            let mut word = String::new();
            while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                word.push(bytes[i].to_ascii_lowercase() as char);
                i += 1;
            }
            words.push(word);
            ranges.push((start, i));
        } else {
            i += 1;
        }
    }

    let is_query = |word: &str| query_words.iter().any(|q| q == word);
    if !words.iter().any(|word| is_query(word)) {
        return "...".to_string();
    }

    // Earliest window of at most max_words covering the most query word
    // occurrences with the smallest span.
    let mut best_start = 0;
    let mut best_end = max_words.min(words.len());
    let mut min_span = words.len();
    for w_start in 0..words.len() {
        let mut covered = 0;
        let mut w_end = w_start;
        while w_end < words.len() && (w_end - w_start + 1) <= max_words {
            if is_query(&words[w_end]) {
                covered += 1;
            }
            let window = w_end - w_start + 1;
            if covered == query_words.len() || (covered > 0 && window == max_words) {
                if w_end - w_start < min_span {
                    min_span = w_end - w_start;
                    best_start = w_start;
                    best_end = w_end + 1;
                }
                break;
            }
            w_end += 1;
        }
    }
    if best_end - best_start > max_words {
        best_end = best_start + max_words;
    }

    let start_pos = ranges[best_start].0;
    let end_pos = if best_end <= ranges.len() {
        ranges[best_end - 1].1
    } else {
        bytes.len()
    };

    // Word ranges begin and end on ASCII bytes, so these are char boundaries.
    let snippet = &content[start_pos..end_pos];
    if snippet.len() <= MAX_SNIPPET_BYTES {
        return snippet.to_string();
    }

    let head = &snippet.as_bytes()[..MAX_SNIPPET_BYTES];
    let cut = head
        .iter()
        .rposition(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'));
    let trimmed = match cut {
        Some(pos) => String::from_utf8_lossy(&head[..pos]),
        None => String::from_utf8_lossy(head),
    };
    format!("{trimmed}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn centers_on_the_query_word() {
        let content = "one two three target five six";
        let snippet = extract(content, &query(&["target"]), 3);
        assert!(snippet.contains("target"), "snippet was {snippet:?}");
        assert!(snippet.len() < content.len());
    }

    #[test]
    fn prefers_the_tightest_window_covering_all_words() {
        let content = "alpha filler filler beta gamma alpha beta";
        let snippet = extract(content, &query(&["alpha", "beta"]), 4);
        // The trailing "alpha beta" pair is the minimal span.
        assert_eq!(snippet, "alpha beta");
    }

    #[test]
    fn snippet_is_a_substring_of_the_content() {
        let content = "the index maps every term to the documents containing it";
        let snippet = extract(content, &query(&["term"]), 5);
        assert!(content.contains(&snippet));
        assert!(snippet.contains("term"));
    }

    #[test]
    fn returns_ellipsis_when_nothing_matches() {
        assert_eq!(extract("plain text here", &query(&["absent"]), 30), "...");
        assert_eq!(extract("", &query(&["word"]), 30), "...");
        assert_eq!(extract("words exist", &[], 30), "...");
    }

    #[test]
    fn matching_is_case_insensitive_and_alnum_based() {
        let snippet = extract("Version V42 shipped", &query(&["v42"]), 2);
        assert!(snippet.contains("V42"));
    }

    #[test]
    fn long_snippets_are_capped_with_ellipsis() {
        // The only window covering both words spans ~500 bytes of padding.
        let mut content = String::from("alpha ");
        for _ in 0..60 {
            content.push_str("padding ");
        }
        content.push_str("omega");
        let snippet = extract(&content, &query(&["alpha", "omega"]), 100);
        assert!(snippet.len() <= MAX_SNIPPET_BYTES + 3);
        assert!(snippet.ends_with("..."));
        assert!(snippet.starts_with("alpha"));
    }
}
