//! Glob pattern tokenization with wildcard capture
//!
//! Powers tracked-file selection and pattern-based renames: `*` and `?`
//! capture the text they match, and captures can be substituted into a
//! target pattern with the same wildcard shape.

use anyhow::Result;
use sos_core::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    /// `*` - any run of characters, captured
    Star,
    /// `?` - exactly one character, captured
    AnyChar,
}

/// A tokenized glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    tokens: Vec<Token>,
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        for c in raw.chars() {
            match c {
                '*' | '?' => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(if c == '*' { Token::Star } else { Token::AnyChar });
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Self {
            raw: raw.to_string(),
            tokens,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of wildcard tokens (`*` and `?`)
    pub fn wildcard_count(&self) -> usize {
        self.tokens
            .iter()
            .filter(|t| !matches!(t, Token::Literal(_)))
            .count()
    }

    /// Match a normalized path (a leading `./` is ignored)
    pub fn matches(&self, path: &str) -> bool {
        self.captures(path).is_some()
    }

    /// Match and return the text captured by each wildcard, in order
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let path = path.strip_prefix("./").unwrap_or(path);
        let mut captures = Vec::new();
        if match_tokens(&self.tokens, path, &mut captures) {
            Some(captures)
        } else {
            None
        }
    }

    /// Rebuild a concrete path by substituting `captures` into this
    /// pattern's wildcards. The capture count must match the wildcard count.
    pub fn substitute(&self, captures: &[String]) -> Result<String> {
        if captures.len() != self.wildcard_count() {
            return Err(Error::PatternMismatch(format!(
                "pattern {:?} has {} wildcard(s) but {} capture(s) were supplied",
                self.raw,
                self.wildcard_count(),
                captures.len()
            ))
            .into());
        }

        let mut out = String::new();
        let mut next = captures.iter();
        for token in &self.tokens {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::Star | Token::AnyChar => out.push_str(next.next().unwrap()),
            }
        }
        Ok(out)
    }
}

/// Backtracking matcher. Stars try the shortest capture first.
fn match_tokens(tokens: &[Token], rest: &str, captures: &mut Vec<String>) -> bool {
    match tokens.first() {
        None => rest.is_empty(),
        Some(Token::Literal(lit)) => match rest.strip_prefix(lit.as_str()) {
            Some(tail) => match_tokens(&tokens[1..], tail, captures),
            None => false,
        },
        Some(Token::AnyChar) => {
            let mut chars = rest.chars();
            match chars.next() {
                Some(c) => {
                    captures.push(c.to_string());
                    if match_tokens(&tokens[1..], chars.as_str(), captures) {
                        true
                    } else {
                        captures.pop();
                        false
                    }
                }
                None => false,
            }
        }
        Some(Token::Star) => {
            // Every split point of `rest`, shortest capture first.
            for (idx, _) in rest.char_indices().chain(std::iter::once((rest.len(), ' '))) {
                captures.push(rest[..idx].to_string());
                if match_tokens(&tokens[1..], &rest[idx..], captures) {
                    return true;
                }
                captures.pop();
            }
            false
        }
    }
}
