//! Document structures returned by the repository.
//!
//! - [`DocumentRecord`]: external identifier plus the term-id sequence, as
//!   read from the term-list store.
//! - [`ParsedDocument`]: the original text with the byte extent of every
//!   token, as stored by repositories built with stored documents. Snippets
//!   are cut from it.
//!
//! # Examples
//!
//! ```
//! use quiver::document::{ParsedDocument, TextSpan};
//!
//! let doc = ParsedDocument::from_text("doc_a", "Lorem ipsum, dolor.");
//! assert_eq!(doc.len(), 3);
//! assert_eq!(doc.token_text(1), Some("ipsum"));
//! assert_eq!(doc.positions[2], TextSpan { begin: 13, end: 18 });
//! ```

use serde::{Deserialize, Serialize};

use crate::analysis::tokenize_text;

/// Internal document identifier.
pub type DocId = u64;

/// Internal term identifier.
pub type TermId = u64;

/// External identifier and term sequence of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub external_id: String,
    pub terms: Vec<TermId>,
}

impl DocumentRecord {
    pub fn new(external_id: String, terms: Vec<TermId>) -> Self {
        DocumentRecord { external_id, terms }
    }

    /// Number of term positions.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Byte extent of a token in the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub begin: usize,
    pub end: usize,
}

/// Stored text of a document with per-token byte extents.
///
/// `positions[i]` is the extent of the token at term position `i`, so it
/// lines up with the document's term list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub external_id: String,
    pub text: String,
    pub positions: Vec<TextSpan>,
}

impl ParsedDocument {
    /// Tokenize `text` and record the extent of every word.
    pub fn from_text<S: Into<String>, T: Into<String>>(external_id: S, text: T) -> Self {
        let text = text.into();
        let positions = tokenize_text(&text)
            .into_iter()
            .map(|token| TextSpan {
                begin: token.begin,
                end: token.end,
            })
            .collect();

        ParsedDocument {
            external_id: external_id.into(),
            text,
            positions,
        }
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Text of the token at `position`.
    pub fn token_text(&self, position: usize) -> Option<&str> {
        let span = self.positions.get(position)?;
        self.text.get(span.begin..span.end)
    }

    /// Text between the end of token `position` and the start of the next
    /// token (or the end of the document).
    pub fn trailing_text(&self, position: usize) -> Option<&str> {
        let span = self.positions.get(position)?;
        let end = self
            .positions
            .get(position + 1)
            .map_or(self.text.len(), |next| next.begin);
        self.text.get(span.end..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_record() {
        let record = DocumentRecord::new("doc_b".to_string(), vec![0, 1, 0]);
        assert_eq!(record.len(), 3);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_parsed_document_extents() {
        let doc = ParsedDocument::from_text("lorem", "Lorem ipsum dolor sit amet, consectetur.");
        assert_eq!(doc.len(), 6);
        assert_eq!(doc.token_text(4), Some("amet"));
        assert_eq!(doc.trailing_text(4), Some(", "));
        assert_eq!(doc.trailing_text(5), Some("."));
        assert_eq!(doc.token_text(6), None);
    }

    #[test]
    fn test_parsed_document_bincode() {
        let doc = ParsedDocument::from_text("x", "one two");
        let bytes = bincode::serialize(&doc).unwrap();
        let back: ParsedDocument = bincode::deserialize(&bytes).unwrap();
        assert_eq!(doc, back);
    }
}
