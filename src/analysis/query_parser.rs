//! Parser for the structured query language.
//!
//! Supported syntax:
//!
//! - bare terms: `hello world`
//! - field-restricted terms: `hello.title` (the field is recorded and the
//!   term kept; repositories have a single text field)
//! - hyphenated words, which split into separate terms: `hello-world`
//! - quoted phrases, equivalent to `#od1`: `"new york"`
//! - `#combine(q1 q2 ...)`
//! - `#weight(w1 q1 w2 q2 ...)`
//! - ordered windows `#odN(t1 t2 ...)`, with `#N(...)` as shorthand
//! - unordered windows `#uwN(t1 t2 ...)`, `#uw(...)` for the whole document
//!
//! Parentheses are only valid after an operator.

use std::fmt;

use crate::error::{QuiverError, Result};

/// A node of a parsed query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    /// A single term, optionally restricted to a field.
    Term { text: String, field: Option<String> },
    /// Average of the children's beliefs.
    Combine(Vec<QueryNode>),
    /// Weighted average of the children's beliefs.
    Weight(Vec<(f64, QueryNode)>),
    /// Terms in order, each within `width` positions of the previous one.
    OrderedWindow { width: usize, terms: Vec<QueryNode> },
    /// Terms in any order within a span of `width` positions.
    UnorderedWindow {
        width: Option<usize>,
        terms: Vec<QueryNode>,
    },
}

impl QueryNode {
    /// A bare term.
    pub fn term<S: Into<String>>(text: S) -> Self {
        QueryNode::Term {
            text: text.into(),
            field: None,
        }
    }

    /// Whether this node produces match extents (a term or a window)
    /// rather than combining beliefs.
    pub fn is_countable(&self) -> bool {
        matches!(
            self,
            QueryNode::Term { .. }
                | QueryNode::OrderedWindow { .. }
                | QueryNode::UnorderedWindow { .. }
        )
    }

    /// Terms of the tree in query order.
    pub fn terms(&self) -> Vec<&str> {
        let mut terms = Vec::new();
        self.collect_terms(&mut terms);
        terms
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            QueryNode::Term { text, .. } => out.push(text),
            QueryNode::Combine(children) => {
                for child in children {
                    child.collect_terms(out);
                }
            }
            QueryNode::Weight(children) => {
                for (_, child) in children {
                    child.collect_terms(out);
                }
            }
            QueryNode::OrderedWindow { terms, .. } | QueryNode::UnorderedWindow { terms, .. } => {
                for term in terms {
                    term.collect_terms(out);
                }
            }
        }
    }

    /// Apply `f` to every term text in the tree.
    pub fn map_terms<F: Fn(&str) -> String>(&mut self, f: &F) {
        match self {
            QueryNode::Term { text, .. } => *text = f(text),
            QueryNode::Combine(children) => children.iter_mut().for_each(|c| c.map_terms(f)),
            QueryNode::Weight(children) => children.iter_mut().for_each(|(_, c)| c.map_terms(f)),
            QueryNode::OrderedWindow { terms, .. } | QueryNode::UnorderedWindow { terms, .. } => {
                terms.iter_mut().for_each(|t| t.map_terms(f))
            }
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, nodes: &[QueryNode]) -> fmt::Result {
            for (i, node) in nodes.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{node}")?;
            }
            Ok(())
        }

        match self {
            QueryNode::Term { text, field: None } => write!(f, "{text}"),
            QueryNode::Term {
                text,
                field: Some(field),
            } => write!(f, "{text}.{field}"),
            QueryNode::Combine(children) => {
                write!(f, "#combine(")?;
                join(f, children)?;
                write!(f, ")")
            }
            QueryNode::Weight(children) => {
                write!(f, "#weight(")?;
                for (i, (weight, child)) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{weight} {child}")?;
                }
                write!(f, ")")
            }
            QueryNode::OrderedWindow { width, terms } => {
                write!(f, "#od{width}(")?;
                join(f, terms)?;
                write!(f, ")")
            }
            QueryNode::UnorderedWindow { width, terms } => {
                match width {
                    Some(width) => write!(f, "#uw{width}(")?,
                    None => write!(f, "#uw(")?,
                }
                join(f, terms)?;
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Operator(String),
    Word(String),
    Open,
    Close,
    Quote,
    Dot,
    Hyphen,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn lex(query: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = query.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '"' => tokens.push(Token::Quote),
            '.' => tokens.push(Token::Dot),
            '-' => tokens.push(Token::Hyphen),
            '#' => {
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !c.is_ascii_alphanumeric() {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if name.is_empty() {
                    return Err(QuiverError::query_syntax(format!(
                        "operator name expected after '#' at offset {start}"
                    )));
                }
                tokens.push(Token::Operator(name.to_lowercase()));
            }
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&(_, c)) = chars.peek() {
                    if !is_word_char(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
            other => {
                return Err(QuiverError::query_syntax(format!(
                    "unexpected character '{other}' at offset {start}"
                )));
            }
        }
    }

    Ok(tokens)
}

/// Parsed operator name.
enum Operator {
    Combine,
    Weight,
    Ordered(usize),
    Unordered(Option<usize>),
}

fn parse_operator(name: &str) -> Result<Operator> {
    let width = |digits: &str| -> Result<usize> {
        digits
            .parse::<usize>()
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| QuiverError::query_syntax(format!("invalid window width in #{name}")))
    };

    match name {
        "combine" => Ok(Operator::Combine),
        "weight" => Ok(Operator::Weight),
        "uw" => Ok(Operator::Unordered(None)),
        _ if name.starts_with("od") && name.len() > 2 => Ok(Operator::Ordered(width(&name[2..])?)),
        _ if name.starts_with("uw") => Ok(Operator::Unordered(Some(width(&name[2..])?))),
        _ if name.chars().all(|c| c.is_ascii_digit()) => Ok(Operator::Ordered(width(name)?)),
        _ => Err(QuiverError::query_syntax(format!(
            "unknown operator #{name}"
        ))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Parse nodes until the end of input, or until a closing parenthesis
    /// when `nested`.
    fn parse_sequence(&mut self, nested: bool) -> Result<Vec<QueryNode>> {
        let mut nodes = Vec::new();

        loop {
            match self.peek() {
                None if nested => {
                    return Err(QuiverError::query_syntax("missing closing parenthesis"));
                }
                None => return Ok(nodes),
                Some(Token::Close) if nested => {
                    self.position += 1;
                    return Ok(nodes);
                }
                Some(Token::Close) => {
                    return Err(QuiverError::query_syntax("unbalanced closing parenthesis"));
                }
                Some(_) => self.parse_node(&mut nodes)?,
            }
        }
    }

    fn parse_node(&mut self, out: &mut Vec<QueryNode>) -> Result<()> {
        match self.next() {
            Some(Token::Operator(name)) => out.push(self.parse_operator_node(&name)?),
            Some(Token::Quote) => out.push(self.parse_phrase()?),
            Some(Token::Word(word)) => self.parse_word(word, out),
            Some(Token::Open) => {
                return Err(QuiverError::query_syntax(
                    "parentheses must follow an operator",
                ));
            }
            // Stray separators carry no terms.
            Some(Token::Dot) | Some(Token::Hyphen) => {}
            Some(Token::Close) | None => {}
        }
        Ok(())
    }

    /// A word, its hyphenated continuations and an optional field suffix.
    fn parse_word(&mut self, word: String, out: &mut Vec<QueryNode>) {
        let mut words = vec![word];
        while let (Some(Token::Hyphen), Some(Token::Word(next))) = (self.peek(), self.peek_at(1)) {
            words.push(next.clone());
            self.position += 2;
        }

        let mut field = None;
        if let (Some(Token::Dot), Some(Token::Word(name))) = (self.peek(), self.peek_at(1)) {
            field = Some(name.clone());
            self.position += 2;
        }

        for word in words {
            out.push(QueryNode::Term {
                text: word,
                field: field.clone(),
            });
        }
    }

    fn parse_phrase(&mut self) -> Result<QueryNode> {
        let mut terms = Vec::new();
        loop {
            match self.next() {
                Some(Token::Quote) => break,
                Some(Token::Word(word)) => terms.push(QueryNode::term(word)),
                Some(Token::Dot) | Some(Token::Hyphen) => {}
                Some(_) => {
                    return Err(QuiverError::query_syntax(
                        "only words may appear inside a quoted phrase",
                    ));
                }
                None => return Err(QuiverError::query_syntax("unterminated quoted phrase")),
            }
        }

        Ok(match terms.len() {
            1 => terms.remove(0),
            _ => QueryNode::OrderedWindow { width: 1, terms },
        })
    }

    fn parse_operator_node(&mut self, name: &str) -> Result<QueryNode> {
        let operator = parse_operator(name)?;
        if self.next() != Some(Token::Open) {
            return Err(QuiverError::query_syntax(format!(
                "expected '(' after #{name}"
            )));
        }

        match operator {
            Operator::Combine => {
                let children = self.parse_sequence(true)?;
                if children.is_empty() {
                    return Err(QuiverError::query_syntax(format!("#{name} has no children")));
                }
                Ok(QueryNode::Combine(children))
            }
            Operator::Weight => self.parse_weighted(name),
            Operator::Ordered(width) => Ok(QueryNode::OrderedWindow {
                width,
                terms: self.parse_window_terms(name)?,
            }),
            Operator::Unordered(width) => Ok(QueryNode::UnorderedWindow {
                width,
                terms: self.parse_window_terms(name)?,
            }),
        }
    }

    fn parse_weighted(&mut self, name: &str) -> Result<QueryNode> {
        let mut children = Vec::new();

        loop {
            match self.next() {
                Some(Token::Close) => break,
                Some(Token::Word(integral)) => {
                    let mut number = integral;
                    if let (Some(Token::Dot), Some(Token::Word(fraction))) =
                        (self.peek(), self.peek_at(1))
                    {
                        number = format!("{number}.{fraction}");
                        self.position += 2;
                    }
                    let weight: f64 = number.parse().map_err(|_| {
                        QuiverError::query_syntax(format!(
                            "expected a weight in #{name}, found '{number}'"
                        ))
                    })?;

                    let mut node = Vec::new();
                    while node.is_empty() {
                        match self.peek() {
                            None | Some(Token::Close) => {
                                return Err(QuiverError::query_syntax(format!(
                                    "weight {weight} in #{name} has no query"
                                )));
                            }
                            Some(_) => self.parse_node(&mut node)?,
                        }
                    }
                    // A hyphenated word shares its weight across its parts.
                    let child = if node.len() == 1 {
                        node.remove(0)
                    } else {
                        QueryNode::Combine(node)
                    };
                    children.push((weight, child));
                }
                Some(Token::Dot) => {
                    return Err(QuiverError::query_syntax(format!(
                        "malformed weight in #{name}"
                    )));
                }
                Some(_) => {
                    return Err(QuiverError::query_syntax(format!(
                        "expected a weight in #{name}"
                    )));
                }
                None => return Err(QuiverError::query_syntax("missing closing parenthesis")),
            }
        }

        if children.is_empty() {
            return Err(QuiverError::query_syntax(format!("#{name} has no children")));
        }
        Ok(QueryNode::Weight(children))
    }

    fn parse_window_terms(&mut self, name: &str) -> Result<Vec<QueryNode>> {
        let nodes = self.parse_sequence(true)?;
        if nodes.is_empty() {
            return Err(QuiverError::query_syntax(format!("#{name} needs at least one term")));
        }

        let mut terms = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                QueryNode::Term { .. } => terms.push(node),
                // A nested phrase flattens into the enclosing window.
                QueryNode::OrderedWindow { width: 1, terms: inner } => terms.extend(inner),
                _ => {
                    return Err(QuiverError::query_syntax(format!(
                        "#{name} accepts only terms"
                    )));
                }
            }
        }
        Ok(terms)
    }
}

/// Parse query text into a tree.
///
/// Several top-level nodes are wrapped in an implicit `#combine`.
pub fn parse_query(query: &str) -> Result<QueryNode> {
    let tokens = lex(query)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };

    let mut nodes = parser.parse_sequence(false)?;
    match nodes.len() {
        0 => Err(QuiverError::query_syntax("query contains no terms")),
        1 => Ok(nodes.remove(0)),
        _ => Ok(QueryNode::Combine(nodes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_terms() {
        let node = parse_query("hello world").unwrap();
        assert_eq!(
            node,
            QueryNode::Combine(vec![QueryNode::term("hello"), QueryNode::term("world")])
        );
        assert_eq!(parse_query("cat").unwrap(), QueryNode::term("cat"));
    }

    #[test]
    fn test_hyphen_and_field() {
        assert_eq!(parse_query("hello-world").unwrap().terms(), vec!["hello", "world"]);

        let node = parse_query("hello.title").unwrap();
        assert_eq!(
            node,
            QueryNode::Term {
                text: "hello".to_string(),
                field: Some("title".to_string())
            }
        );
    }

    #[test]
    fn test_quoted_phrase() {
        let node = parse_query("hello \"new york\"").unwrap();
        assert_eq!(
            node,
            QueryNode::Combine(vec![
                QueryNode::term("hello"),
                QueryNode::OrderedWindow {
                    width: 1,
                    terms: vec![QueryNode::term("new"), QueryNode::term("york")]
                }
            ])
        );
        assert_eq!(parse_query("hello \"world\"").unwrap().terms(), vec!["hello", "world"]);
    }

    #[test]
    fn test_operators() {
        let node = parse_query("#combine(#od1(consectetur adipiscing) #uw8(a b) #3(c d))").unwrap();
        assert_eq!(
            node.to_string(),
            "#combine(#od1(consectetur adipiscing) #uw8(a b) #od3(c d))"
        );

        let node = parse_query("#weight(0.7 cat 0.3 #od1(dog food))").unwrap();
        match node {
            QueryNode::Weight(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].0, 0.7);
                assert_eq!(children[1].1.terms(), vec!["dog", "food"]);
            }
            other => panic!("unexpected node {other:?}"),
        }

        assert_eq!(parse_query("#uw(a b)").unwrap().to_string(), "#uw(a b)");
    }

    #[test]
    fn test_syntax_errors() {
        for query in [
            "hello (world)",
            "#combine(a b",
            "a b)",
            "#frobnicate(a)",
            "#od0(a b)",
            "#od1(#combine(a) b)",
            "#weight(cat 0.5)",
            "#combine()",
            "#combine( - . )",
            "cat #combine()",
            "#weight()",
            "hello:world",
            "\"open phrase",
            "",
            "   ",
        ] {
            let result = parse_query(query);
            assert!(
                matches!(result, Err(QuiverError::QuerySyntax(_))),
                "{query:?} parsed as {result:?}"
            );
        }
    }

    #[test]
    fn test_map_terms() {
        let mut node = parse_query("#combine(Cats #od1(Big Dogs))").unwrap();
        node.map_terms(&|t: &str| t.to_lowercase());
        assert_eq!(node.terms(), vec!["cats", "big", "dogs"]);
        assert!(!node.is_countable());
        assert!(QueryNode::term("x").is_countable());
    }
}
