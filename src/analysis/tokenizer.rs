//! Query and document tokenization.
//!
//! Two tokenizers live here. [`tokenize`] splits query text into terms using
//! the query-language grammar, so it rejects what the parser rejects.
//! [`tokenize_text`] splits document text into words with their byte
//! extents, which is what term lists and snippets are built from.

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::query_parser::parse_query;
use crate::error::Result;

/// Remove or blank out characters that have meaning in the query language.
///
/// Brackets, quotes, backticks and `$` are dropped; other punctuation
/// (`.`, `:`, `/`, `,`, `-`, ...) and tabs become spaces.
///
/// ```
/// use quiver::analysis::escape;
///
/// assert_eq!(escape("hello (world)"), "hello world");
/// assert_eq!(escape("hello.world"), "hello world");
/// ```
pub fn escape(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '(' | ')' | '\'' | '"' | '`' | '$' => None,
            '.' | ':' | '\t' | '/' | '&' | ',' | '-' | '?' | '+' | ';' | '<' | '>' | '%' => {
                Some(' ')
            }
            c => Some(c),
        })
        .collect()
}

/// Split query text into its terms, in query order.
///
/// Field suffixes are dropped (`hello.world` yields only `hello`), hyphens
/// split words and quotes are removed. Text that is not a valid query, such
/// as bare parentheses, is a [`crate::error::QuiverError::QuerySyntax`]
/// error; run it through [`escape`] first to tokenize arbitrary text.
pub fn tokenize(text: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let node = parse_query(text)?;
    Ok(node.terms().into_iter().map(str::to_string).collect())
}

/// A word of document text and its byte extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextToken {
    pub text: String,
    pub begin: usize,
    pub end: usize,
}

/// Split document text into words on Unicode word boundaries.
///
/// Apostrophes inside a word are kept with it (`who's`); punctuation and
/// whitespace between words is not part of any token.
pub fn tokenize_text(text: &str) -> Vec<TextToken> {
    text.unicode_word_indices()
        .map(|(begin, word)| TextToken {
            text: word.to_string(),
            begin,
            end: begin + word.len(),
        })
        .collect()
}
