//! Template matching and rewriting.
//!
//! Templates are source text with named holes written `:[name]`. The core only
//! talks to the [`Matcher`] trait; [`TemplateMatcher`] is the built-in,
//! purely textual implementation used by the CLI.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::location::LocationRange;
use crate::sources::{compute_line_offsets, offset_to_location};

/// One occurrence of a match template within a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub location: LocationRange,
    /// Text captured by each named hole.
    pub bindings: BTreeMap<String, String>,
}

pub trait Matcher: Send + Sync {
    /// All non-overlapping occurrences of `template` in `text`, in text order.
    fn find_matches(&self, text: &str, template: &str) -> Result<Vec<Match>>;

    /// Instantiate `template` with the given hole bindings.
    fn substitute(&self, template: &str, bindings: &BTreeMap<String, String>) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Space,
    Hole(String),
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns the hole name and the byte length of `:[name]` if `s` starts with one.
fn hole_at(s: &str) -> Option<(&str, usize)> {
    let rest = s.strip_prefix(":[")?;
    let close = rest.find(']')?;
    let name = &rest[..close];
    if !name.is_empty() && name.chars().all(is_ident_char) {
        Some((name, close + 3))
    } else {
        None
    }
}

fn parse_template(template: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut rest = template.trim();

    while let Some(c) = rest.chars().next() {
        if rest.starts_with(":[") {
            let (name, len) = hole_at(rest)
                .ok_or_else(|| Error::BadFormat(format!("malformed hole in template '{}'", template)))?;
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Hole(name.to_string()));
            rest = &rest[len..];
        } else if c.is_whitespace() {
            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::Space);
            rest = rest.trim_start();
        } else {
            literal.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    if tokens.is_empty() {
        return Err(Error::BadFormat("empty match template".into()));
    }
    Ok(tokens)
}

fn closer_for(c: char) -> Option<char> {
    match c {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

/// Candidate end offsets for a hole starting at `start`, shortest first.
///
/// Hole contents are balanced with respect to brackets and string literals,
/// never start or end with whitespace, and never cross a `;` or a newline
/// outside brackets. A trailing hole only offers its longest candidate.
fn hole_ends(text: &str, start: usize, trailing: bool) -> Vec<usize> {
    let mut ends = Vec::new();
    let rest = &text[start..];
    match rest.chars().next() {
        Some(c) if !c.is_whitespace() => {}
        _ => return ends,
    }

    let mut stack: Vec<char> = Vec::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        let mut end = start + i + c.len_utf8();
        if let Some(close) = closer_for(c) {
            stack.push(close);
        } else if matches!(c, ')' | ']' | '}') {
            if stack.last() == Some(&c) {
                stack.pop();
            } else {
                break;
            }
        } else if c == '"' {
            // skip to the closing quote on the same line
            let mut escaped = false;
            let mut closed = false;
            for (j, q) in chars.by_ref() {
                end = start + j + q.len_utf8();
                if q == '\n' {
                    break;
                }
                if escaped {
                    escaped = false;
                } else if q == '\\' {
                    escaped = true;
                } else if q == '"' {
                    closed = true;
                    break;
                }
            }
            if !closed {
                break;
            }
        } else if stack.is_empty() && (c == ';' || c == '\n') {
            break;
        }

        if stack.is_empty() && !text[..end].ends_with(char::is_whitespace) {
            ends.push(end);
        }
    }

    if trailing {
        ends.pop().into_iter().collect()
    } else {
        ends
    }
}

struct Search<'t> {
    text: &'t str,
    tokens: &'t [Token],
    bindings: Vec<(&'t str, usize, usize)>,
}

impl<'t> Search<'t> {
    fn match_from(&mut self, index: usize, pos: usize) -> Option<usize> {
        let tokens = self.tokens;
        let Some(token) = tokens.get(index) else {
            return Some(pos);
        };
        match token {
            Token::Literal(literal) => {
                if self.text[pos..].starts_with(literal.as_str()) {
                    self.match_from(index + 1, pos + literal.len())
                } else {
                    None
                }
            }
            Token::Space => {
                let rest = &self.text[pos..];
                let run = rest.len() - rest.trim_start().len();
                if run == 0 {
                    None
                } else {
                    self.match_from(index + 1, pos + run)
                }
            }
            Token::Hole(name) => {
                let trailing = index + 1 == tokens.len();
                for end in hole_ends(self.text, pos, trailing) {
                    let previous = self.bindings.iter().find(|(n, _, _)| *n == name.as_str());
                    if let Some(&(_, s, e)) = previous {
                        if self.text[s..e] != self.text[pos..end] {
                            continue;
                        }
                    }
                    self.bindings.push((name.as_str(), pos, end));
                    if let Some(done) = self.match_from(index + 1, end) {
                        return Some(done);
                    }
                    self.bindings.pop();
                }
                None
            }
        }
    }
}

/// Textual `:[hole]` template matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateMatcher;

impl TemplateMatcher {
    pub fn new() -> Self {
        TemplateMatcher
    }

    /// Could a leading hole start capturing at `pos`?
    fn starts_term(text: &str, pos: usize) -> bool {
        match text[pos..].chars().next() {
            Some(c) if !c.is_whitespace() => {}
            _ => return false,
        }
        match text[..pos].chars().next_back() {
            None => true,
            Some(prev) => prev.is_whitespace() || !(is_ident_char(prev) || matches!(prev, ')' | ']' | '}' | '"' | '.')),
        }
    }

    fn search_at<'t>(text: &'t str, tokens: &'t [Token], pos: usize) -> Option<(usize, Vec<(&'t str, usize, usize)>)> {
        let mut search = Search {
            text,
            tokens,
            bindings: Vec::new(),
        };
        let end = search.match_from(0, pos).filter(|&end| end > pos)?;
        Some((end, search.bindings))
    }
}

impl Matcher for TemplateMatcher {
    fn find_matches(&self, text: &str, template: &str) -> Result<Vec<Match>> {
        let tokens = parse_template(template)?;
        let leading_hole = matches!(tokens.first(), Some(Token::Hole(_)));
        let starts_with_word = matches!(tokens.first(), Some(Token::Literal(l)) if l.starts_with(is_ident_char));
        let ends_with_word = matches!(tokens.last(), Some(Token::Literal(l)) if l.ends_with(is_ident_char));
        let word_end_ok = |end: usize| !(ends_with_word && text[end..].starts_with(is_ident_char));
        let offsets = compute_line_offsets(text);

        let mut matches = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            let here = text[pos..].chars().next().map_or(1, char::len_utf8);
            let skip = (starts_with_word && text[..pos].ends_with(is_ident_char))
                || (leading_hole && !Self::starts_term(text, pos));
            if skip {
                pos += here;
                continue;
            }

            let Some(mut found) = Self::search_at(text, &tokens, pos).filter(|(end, _)| word_end_ok(*end)) else {
                pos += here;
                continue;
            };
            let mut start = pos;

            // a leading hole captures as little as possible: prefer the
            // latest start inside the first capture that still matches
            if leading_hole {
                let first_capture_end = found.1[0].2;
                for later in pos + 1..first_capture_end {
                    if !text.is_char_boundary(later) || !Self::starts_term(text, later) {
                        continue;
                    }
                    if let Some(candidate) = Self::search_at(text, &tokens, later).filter(|(end, _)| word_end_ok(*end)) {
                        start = later;
                        found = candidate;
                    }
                }
            }

            let (end, bindings) = found;
            matches.push(Match {
                location: LocationRange::new(
                    offset_to_location(&offsets, start),
                    offset_to_location(&offsets, end),
                ),
                bindings: bindings
                    .iter()
                    .map(|&(name, s, e)| (name.to_string(), text[s..e].to_string()))
                    .collect(),
            });
            pos = end;
        }
        Ok(matches)
    }

    fn substitute(&self, template: &str, bindings: &BTreeMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(at) = rest.find(":[") {
            out.push_str(&rest[..at]);
            match hole_at(&rest[at..]) {
                Some((name, len)) => {
                    let value = bindings
                        .get(name)
                        .ok_or_else(|| Error::BadFormat(format!("no argument supplied for hole '{}'", name)))?;
                    out.push_str(value);
                    rest = &rest[at + len..];
                }
                None => {
                    out.push_str(":[");
                    rest = &rest[at + 2..];
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
