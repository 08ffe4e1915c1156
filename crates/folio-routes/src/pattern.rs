//! URL pattern parsing and matching.
//!
//! Supports the pathname subset of the URLPattern syntax:
//!
//! - named parameters: `/post/:id`
//! - parameters with a custom regex: `/post/:id(\d+)`
//! - unnamed regex groups: `/docs/(.*)`
//! - wildcards: `/assets/*`
//! - groups with modifiers: `/books{/:id}?`
//! - the `?`, `*` and `+` modifiers on parameters
//! - `\` escapes for literal syntax characters
//!
//! Unnamed groups and wildcards are captured under their position (`"0"`,
//! `"1"`, ...), the same way URLPattern numbers them.

use std::collections::BTreeMap;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::CompileError;

/// Parameters extracted from a matched pathname.
pub type Params = BTreeMap<String, String>;

/// Repetition applied to a parameter or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    None,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

/// What a parameter is allowed to match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// A single path segment (`[^/]+`).
    Segment,
    /// A user-supplied regex.
    Regex(String),
    /// Anything, including `/`.
    Wildcard,
}

impl ParamKind {
    fn from_regex(regex: String) -> Self {
        if regex == ".*" {
            Self::Wildcard
        } else {
            Self::Regex(regex)
        }
    }

    fn regex(&self) -> &str {
        match self {
            Self::Segment => "[^/]+",
            Self::Regex(regex) => regex,
            Self::Wildcard => ".*",
        }
    }
}

/// A parsed piece of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Param {
        name: String,
        kind: ParamKind,
        modifier: Modifier,
    },
    Group {
        tokens: Vec<Token>,
        modifier: Modifier,
    },
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::Param { .. } => true,
            Self::Group { tokens, modifier } => {
                *modifier != Modifier::None || tokens.iter().any(Token::is_dynamic)
            }
        }
    }
}

/// A pattern compiled to an anchored regex.
#[derive(Clone)]
pub struct CompiledPattern {
    source: String,
    tokens: Vec<Token>,
    regex: Regex,
    names: Vec<String>,
    case_insensitive: bool,
}

impl CompiledPattern {
    /// Parse and compile a pathname pattern.
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, CompileError> {
        let tokens = parse(source)?;

        let mut expr = String::from("^");
        let mut names = Vec::new();
        write_tokens(&tokens, &mut expr, &mut names);
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| CompileError::Pattern {
                pattern: source.to_string(),
                offset: 0,
                message: e.to_string(),
            })?;

        Ok(Self {
            source: source.to_string(),
            tokens,
            regex,
            names,
            case_insensitive,
        })
    }

    /// The pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parsed tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Whether the pattern contains parameters, wildcards or optional groups.
    pub fn is_dynamic(&self) -> bool {
        self.tokens.iter().any(Token::is_dynamic)
    }

    /// Test a pathname against the pattern.
    pub fn test(&self, pathname: &str) -> bool {
        self.regex.is_match(pathname)
    }

    /// Match a pathname and extract its parameters.
    pub fn exec(&self, pathname: &str) -> Option<Params> {
        let captures = self.regex.captures(pathname)?;

        let params = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| (name.clone(), m.as_str().to_string()))
            })
            .collect();

        Some(params)
    }
}

impl fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("source", &self.source)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl Eq for CompiledPattern {}

/// Parse a pattern into tokens.
pub fn parse(source: &str) -> Result<Vec<Token>, CompileError> {
    let mut parser = PatternParser {
        source,
        chars: source.chars().collect(),
        pos: 0,
        next_index: 0,
    };

    let tokens = parser.parse_tokens(false)?;

    if parser.pos < parser.chars.len() {
        return Err(parser.error("unbalanced '}'"));
    }

    Ok(tokens)
}

struct PatternParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    next_index: usize,
}

impl PatternParser<'_> {
    fn parse_tokens(&mut self, in_group: bool) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();

        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.pos += 1;
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("trailing escape character"))?;
                    literal.push(escaped);
                }
                ':' => {
                    self.pos += 1;
                    let name = self.take_name();
                    if name.is_empty() {
                        return Err(self.error("expected a parameter name after ':'"));
                    }
                    let kind = if self.peek() == Some('(') {
                        ParamKind::from_regex(self.take_regex()?)
                    } else {
                        ParamKind::Segment
                    };
                    flush(&mut literal, &mut tokens);
                    let modifier = self.take_modifier();
                    tokens.push(Token::Param {
                        name,
                        kind,
                        modifier,
                    });
                }
                '(' => {
                    let kind = ParamKind::from_regex(self.take_regex()?);
                    flush(&mut literal, &mut tokens);
                    let name = self.next_name();
                    let modifier = self.take_modifier();
                    tokens.push(Token::Param {
                        name,
                        kind,
                        modifier,
                    });
                }
                '*' => {
                    self.pos += 1;
                    flush(&mut literal, &mut tokens);
                    let name = self.next_name();
                    let modifier = self.take_modifier();
                    tokens.push(Token::Param {
                        name,
                        kind: ParamKind::Wildcard,
                        modifier,
                    });
                }
                '{' => {
                    self.pos += 1;
                    flush(&mut literal, &mut tokens);
                    let inner = self.parse_tokens(true)?;
                    if self.bump() != Some('}') {
                        return Err(self.error("unclosed '{' group"));
                    }
                    let modifier = self.take_modifier();
                    tokens.push(Token::Group {
                        tokens: inner,
                        modifier,
                    });
                }
                '}' if in_group => break,
                '}' => return Err(self.error("unbalanced '}'")),
                _ => {
                    literal.push(c);
                    self.pos += 1;
                }
            }
        }

        flush(&mut literal, &mut tokens);
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn take_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        name
    }

    fn next_name(&mut self) -> String {
        let name = self.next_index.to_string();
        self.next_index += 1;
        name
    }

    fn take_modifier(&mut self) -> Modifier {
        let modifier = match self.peek() {
            Some('?') => Modifier::Optional,
            Some('*') => Modifier::ZeroOrMore,
            Some('+') => Modifier::OneOrMore,
            _ => return Modifier::None,
        };
        self.pos += 1;
        modifier
    }

    /// Read a balanced `( ... )` group and return its inner regex.
    fn take_regex(&mut self) -> Result<String, CompileError> {
        let start = self.pos;
        self.pos += 1;

        let mut depth = 1;
        let mut in_class = false;
        let mut regex = String::new();

        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error_at(start, "unclosed '(' group"))?;
            match c {
                '\\' => {
                    regex.push(c);
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("trailing escape character"))?;
                    regex.push(escaped);
                    continue;
                }
                '[' => in_class = true,
                ']' => in_class = false,
                '(' if !in_class => depth += 1,
                ')' if !in_class => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            regex.push(c);
        }

        if regex.is_empty() {
            return Err(self.error_at(start, "empty regex group"));
        }

        check_embeddable(&regex).map_err(|message| self.error_at(start, &message))?;
        Ok(regex)
    }

    fn error(&self, message: &str) -> CompileError {
        self.error_at(self.pos, message)
    }

    fn error_at(&self, offset: usize, message: &str) -> CompileError {
        CompileError::Pattern {
            pattern: self.source.to_string(),
            offset,
            message: message.to_string(),
        }
    }
}

/// Check that a regex can be embedded as a single capture group.
pub(crate) fn check_embeddable(regex: &str) -> Result<(), String> {
    let compiled = Regex::new(regex).map_err(|e| e.to_string())?;
    if compiled.captures_len() > 1 {
        return Err(format!(
            "regex `{regex}` contains a capturing group; use (?:...) instead"
        ));
    }
    Ok(())
}

fn flush(literal: &mut String, tokens: &mut Vec<Token>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

fn write_tokens(tokens: &[Token], out: &mut String, names: &mut Vec<String>) {
    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Literal(text) => out.push_str(&regex::escape(text)),
            Token::Param {
                name,
                kind,
                modifier,
            } => {
                names.push(name.clone());
                let inner = kind.regex();

                // A repeated or optional parameter owns the '/' in front of it.
                let slash_before = i > 0
                    && matches!(&tokens[i - 1], Token::Literal(text) if text.ends_with('/'));
                let prefix = if *modifier != Modifier::None && slash_before {
                    out.pop();
                    "/"
                } else {
                    ""
                };

                let expr = match modifier {
                    Modifier::None => format!("({inner})"),
                    Modifier::Optional => format!("(?:{prefix}({inner}))?"),
                    Modifier::OneOrMore => {
                        format!("{prefix}((?:{inner})(?:{prefix}(?:{inner}))*)")
                    }
                    Modifier::ZeroOrMore => {
                        format!("(?:{prefix}((?:{inner})(?:{prefix}(?:{inner}))*))?")
                    }
                };
                out.push_str(&expr);
            }
            Token::Group { tokens, modifier } => {
                out.push_str("(?:");
                write_tokens(tokens, out, names);
                out.push(')');
                match modifier {
                    Modifier::None => {}
                    Modifier::Optional => out.push('?'),
                    Modifier::ZeroOrMore => out.push('*'),
                    Modifier::OneOrMore => out.push('+'),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pattern(source: &str) -> CompiledPattern {
        CompiledPattern::new(source, false).unwrap()
    }

    #[test]
    fn matches_named_params() {
        let p = pattern("/post/:id");

        let params = p.exec("/post/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
        assert!(!p.test("/post/42/comments"));
        assert!(!p.test("/post/"));
        assert!(p.is_dynamic());
    }

    #[test]
    fn matches_custom_regex_params() {
        let p = pattern(r"/post/:id(\d+)");

        assert!(p.test("/post/42"));
        assert!(!p.test("/post/abc"));
    }

    #[test]
    fn numbers_unnamed_groups() {
        let p = pattern("/docs/(.*)");

        let params = p.exec("/docs/a/b").unwrap();
        assert_eq!(params.get("0").map(String::as_str), Some("a/b"));
        assert!(p.test("/docs/"));
        assert_eq!(p.tokens()[1], Token::Param {
            name: "0".to_string(),
            kind: ParamKind::Wildcard,
            modifier: Modifier::None,
        });
    }

    #[test]
    fn optional_param_owns_leading_slash() {
        let p = pattern("/docs/:slug?");

        assert!(p.test("/docs"));
        assert!(p.test("/docs/intro"));
        assert!(!p.test("/docs/"));
        assert!(p.exec("/docs").unwrap().is_empty());
    }

    #[test]
    fn optional_groups() {
        let p = pattern("/books{/:id}?");

        assert!(p.test("/books"));
        assert_eq!(
            p.exec("/books/7").unwrap().get("id").map(String::as_str),
            Some("7")
        );
    }

    #[test]
    fn repeated_params() {
        let p = pattern("/files/:path+");

        assert_eq!(
            p.exec("/files/a/b/c").unwrap().get("path").map(String::as_str),
            Some("a/b/c")
        );
        assert!(!p.test("/files"));

        let p = pattern("/files/:path*");
        assert!(p.test("/files"));
    }

    #[test]
    fn wildcard_star() {
        let p = pattern("/assets/*");

        assert!(p.test("/assets/css/site.css"));
        assert!(!p.test("/other"));
    }

    #[test]
    fn escapes_and_literals() {
        let p = pattern(r"/a\:b/c.html");

        assert!(!p.is_dynamic());
        assert!(p.test("/a:b/c.html"));
        assert!(!p.test("/a:b/cxhtml"));
    }

    #[test]
    fn case_insensitive_static_patterns() {
        let p = CompiledPattern::new("/docs/intro", true).unwrap();

        assert!(p.test("/Docs/Intro"));
        assert!(!pattern("/docs/intro").test("/Docs/Intro"));
    }

    #[test]
    fn literal_only_group_is_static() {
        assert!(!pattern("/a{/b}").is_dynamic());
        assert!(pattern("/a{/b}?").is_dynamic());
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!(matches!(
            CompiledPattern::new("/a/{b", false),
            Err(CompileError::Pattern { .. })
        ));
        assert!(matches!(
            CompiledPattern::new("/a/b}", false),
            Err(CompileError::Pattern { .. })
        ));
        assert!(matches!(
            CompiledPattern::new("/a/:", false),
            Err(CompileError::Pattern { .. })
        ));
        assert!(matches!(
            CompiledPattern::new("/a/(", false),
            Err(CompileError::Pattern { .. })
        ));
    }

    #[test]
    fn rejects_capturing_groups_inside_regex() {
        let err = CompiledPattern::new("/a/:id((x)|y)", false).unwrap_err();
        assert!(err.to_string().contains("capturing group"));

        assert!(CompiledPattern::new("/a/:id((?:x)|y)", false).is_ok());
    }
}
