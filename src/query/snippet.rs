//! Plain-text snippets cut from stored documents.
//!
//! Words around every match are copied from the original text, matched
//! words upper-cased, and the result wrapped into short lines. Elided text
//! after a window is marked with an ellipsis.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::document::{DocId, ParsedDocument};
use crate::engine::QueryAnnotation;

/// Configuration for snippet construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetConfig {
    /// Context words kept before a match.
    pub words_before: usize,
    /// Context words kept after a match.
    pub words_after: usize,
    /// Upper bound on words in a snippet.
    pub max_words: usize,
    /// Lines are broken before they would exceed this many characters.
    pub line_width: usize,
    /// Marker for elided text.
    pub ellipsis: String,
    /// Whether matched words are upper-cased.
    pub uppercase_matches: bool,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        SnippetConfig {
            words_before: 4,
            words_after: 7,
            max_words: 50,
            line_width: 50,
            ellipsis: "...".to_string(),
            uppercase_matches: true,
        }
    }
}

impl SnippetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn words_before(mut self, words_before: usize) -> Self {
        self.words_before = words_before;
        self
    }

    pub fn words_after(mut self, words_after: usize) -> Self {
        self.words_after = words_after;
        self
    }

    pub fn max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    pub fn line_width(mut self, line_width: usize) -> Self {
        self.line_width = line_width;
        self
    }

    pub fn ellipsis<S: Into<String>>(mut self, ellipsis: S) -> Self {
        self.ellipsis = ellipsis.into();
        self
    }

    pub fn uppercase_matches(mut self, uppercase_matches: bool) -> Self {
        self.uppercase_matches = uppercase_matches;
        self
    }
}

/// Build the snippet of `document` for the matches recorded in `annotation`.
///
/// Without matches the opening words of the document are used.
pub fn build_snippet(
    document: DocId,
    parsed: &ParsedDocument,
    annotation: &QueryAnnotation,
    config: &SnippetConfig,
) -> String {
    let length = parsed.len();
    if length == 0 || config.max_words == 0 {
        return String::new();
    }

    let mut matched = BTreeSet::new();
    let mut windows = Vec::new();
    for extent in annotation.matches(document) {
        let begin = extent.begin as usize;
        let end = (extent.end as usize).min(length);
        if begin >= end {
            continue;
        }
        matched.extend(begin..end);
        windows.push((
            begin.saturating_sub(config.words_before),
            (end + config.words_after).min(length),
        ));
    }
    if windows.is_empty() {
        windows.push((
            0,
            (config.words_before + config.words_after + 1).min(length),
        ));
    }

    let mut writer = LineWriter::new(config.line_width);
    let mut budget = config.max_words;
    for (begin, end) in merge_windows(windows) {
        if budget == 0 {
            break;
        }
        let end = end.min(begin + budget);
        budget -= end - begin;

        for position in begin..end {
            let Some(word) = parsed.token_text(position) else {
                continue;
            };
            let mut piece = if config.uppercase_matches && matched.contains(&position) {
                word.to_uppercase()
            } else {
                word.to_string()
            };

            let last = position + 1 == end;
            if last && end < length {
                piece.push_str(&config.ellipsis);
            } else {
                piece.push_str(&collapse_whitespace(
                    parsed.trailing_text(position).unwrap_or_default(),
                ));
            }
            writer.push(&piece);
        }
    }

    writer.finish()
}

/// Sort windows and merge those that overlap or touch.
fn merge_windows(mut windows: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    windows.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(windows.len());
    for (begin, end) in windows {
        match merged.last_mut() {
            Some(last) if begin <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((begin, end)),
        }
    }
    merged
}

/// Inter-word text with whitespace runs collapsed and trailing space dropped.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

struct LineWriter {
    width: usize,
    out: String,
    line_length: usize,
}

impl LineWriter {
    fn new(width: usize) -> Self {
        LineWriter {
            width,
            out: String::new(),
            line_length: 0,
        }
    }

    fn push(&mut self, piece: &str) {
        let length = piece.chars().count();
        if self.line_length > 0 {
            if self.line_length + 1 + length > self.width {
                self.out.push('\n');
                self.line_length = 0;
            } else {
                self.out.push(' ');
                self.line_length += 1;
            }
        }
        self.out.push_str(piece);
        self.line_length += length;
    }

    fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;

    use super::*;
    use crate::analysis::QueryNode;
    use crate::engine::{Extent, ScoredDocument};

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. \
        Duis eget tortor vel   nunc posuere porttitor. Nullam quis mauris vitae \
        leo dapibus fringilla.";

    fn annotation(document: DocId, extents: Vec<Extent>) -> QueryAnnotation {
        let mut matches = AHashMap::new();
        matches.insert(document, extents);
        QueryAnnotation::new(
            QueryNode::term("ipsum"),
            vec![ScoredDocument {
                document,
                score: -6.37,
            }],
            matches,
        )
    }

    #[test]
    fn test_single_match() {
        let parsed = ParsedDocument::from_text("lorem", LOREM);
        let snippet = build_snippet(
            1,
            &parsed,
            &annotation(1, vec![Extent::at(1)]),
            &SnippetConfig::default(),
        );
        assert_eq!(
            snippet,
            "Lorem IPSUM dolor sit amet, consectetur adipiscing\nelit. Duis..."
        );
    }

    #[test]
    fn test_windows_merge_and_reach_end() {
        let parsed = ParsedDocument::from_text("lorem", LOREM);
        let config = SnippetConfig::default().words_before(1).words_after(1);
        let snippet = build_snippet(
            1,
            &parsed,
            &annotation(1, vec![Extent::at(2), Extent::at(3), Extent::at(21)]),
            &config,
        );
        assert_eq!(snippet, "ipsum DOLOR SIT amet... dapibus FRINGILLA.");
    }

    #[test]
    fn test_word_budget() {
        let parsed = ParsedDocument::from_text("lorem", LOREM);
        let config = SnippetConfig::default().max_words(3);
        let snippet = build_snippet(
            1,
            &parsed,
            &annotation(1, vec![Extent::at(1)]),
            &config,
        );
        assert_eq!(snippet, "Lorem IPSUM dolor...");
    }

    #[test]
    fn test_no_matches_uses_opening_words() {
        let parsed = ParsedDocument::from_text("short", "cat dog   bird");
        let snippet = build_snippet(
            5,
            &parsed,
            &annotation(1, vec![Extent::at(0)]),
            &SnippetConfig::default().uppercase_matches(false),
        );
        assert_eq!(snippet, "cat dog bird");
    }

    #[test]
    fn test_empty_document() {
        let parsed = ParsedDocument::from_text("empty", "");
        let snippet = build_snippet(
            1,
            &parsed,
            &annotation(1, vec![Extent::at(0)]),
            &SnippetConfig::default(),
        );
        assert!(snippet.is_empty());
    }

    #[test]
    fn test_merge_windows() {
        assert_eq!(
            merge_windows(vec![(5, 9), (0, 3), (3, 4), (8, 12)]),
            vec![(0, 4), (5, 12)]
        );
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace(",  "), ",");
        assert_eq!(collapse_whitespace(" \n - "), " -");
        assert_eq!(collapse_whitespace(""), "");
    }
}
