//! A minimal unified-diff parser and applier for the local backend.

use std::iter::Peekable;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

impl HunkLine {
    fn text_mut(&mut self) -> &mut String {
        match self {
            HunkLine::Context(s) | HunkLine::Remove(s) | HunkLine::Add(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Hunk {
    old_start: usize,
    old_len: usize,
    lines: Vec<HunkLine>,
}

/// The changes a diff makes to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    pub path: String,
    hunks: Vec<Hunk>,
}

fn bad(message: impl Into<String>) -> Error {
    Error::BadFormat(message.into())
}

fn header_path(line: &str, prefix: &str) -> Result<String> {
    let rest = line
        .strip_prefix(prefix)
        .ok_or_else(|| bad(format!("expected '{}' header", prefix.trim_end())))?;
    let rest = rest.trim_end_matches(['\n', '\r']);
    // drop an optional tab-separated timestamp
    let path = rest.split('\t').next().unwrap_or(rest);
    Ok(path.to_string())
}

/// `l` or `l,n` from a hunk header.
fn parse_range(range: &str) -> Result<(usize, usize)> {
    let parse = |s: &str| s.parse::<usize>().map_err(|_| bad(format!("bad hunk range: {}", range)));
    match range.split_once(',') {
        Some((start, len)) => Ok((parse(start)?, parse(len)?)),
        None => Ok((parse(range)?, 1)),
    }
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize, usize, usize)> {
    let mut parts = line.split_whitespace();
    let (Some("@@"), Some(old), Some(new), Some("@@")) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad(format!("bad hunk header: {}", line.trim_end())));
    };
    let old = old
        .strip_prefix('-')
        .ok_or_else(|| bad(format!("bad hunk header: {}", line.trim_end())))?;
    let new = new
        .strip_prefix('+')
        .ok_or_else(|| bad(format!("bad hunk header: {}", line.trim_end())))?;
    let (old_start, old_len) = parse_range(old)?;
    let (new_start, new_len) = parse_range(new)?;
    Ok((old_start, old_len, new_start, new_len))
}

fn parse_hunk<'a, I>(header: &str, lines: &mut Peekable<I>) -> Result<Hunk>
where
    I: Iterator<Item = &'a str>,
{
    let (old_start, old_len, _, new_len) = parse_hunk_header(header)?;
    let mut old_left = old_len;
    let mut new_left = new_len;
    let mut body: Vec<HunkLine> = Vec::new();

    while old_left > 0 || new_left > 0 {
        let line = lines.next().ok_or_else(|| bad("unexpected end of hunk"))?;
        let (tag, text) = match line.char_indices().nth(1) {
            Some((i, _)) => (&line[..i], &line[i..]),
            None => (line, "\n"),
        };
        match tag {
            " " | "\n" => {
                body.push(HunkLine::Context(text.to_string()));
                old_left = old_left.checked_sub(1).ok_or_else(|| bad("hunk longer than its header"))?;
                new_left = new_left.checked_sub(1).ok_or_else(|| bad("hunk longer than its header"))?;
            }
            "-" => {
                body.push(HunkLine::Remove(text.to_string()));
                old_left = old_left.checked_sub(1).ok_or_else(|| bad("hunk longer than its header"))?;
            }
            "+" => {
                body.push(HunkLine::Add(text.to_string()));
                new_left = new_left.checked_sub(1).ok_or_else(|| bad("hunk longer than its header"))?;
            }
            "\\" => strip_newline(&mut body)?,
            _ => return Err(bad(format!("bad hunk line: {}", line.trim_end()))),
        }
    }
    while lines.peek().is_some_and(|l| l.starts_with('\\')) {
        lines.next();
        strip_newline(&mut body)?;
    }

    Ok(Hunk {
        old_start,
        old_len,
        lines: body,
    })
}

/// Applies a "\ No newline at end of file" marker to the preceding line.
fn strip_newline(body: &mut [HunkLine]) -> Result<()> {
    let last = body
        .last_mut()
        .ok_or_else(|| bad("no-newline marker before any hunk line"))?;
    let text = last.text_mut();
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    Ok(())
}

/// Splits a multi-file unified diff into per-file patches.
pub fn parse(diff: &str) -> Result<Vec<FilePatch>> {
    let mut patches: Vec<FilePatch> = Vec::new();
    let mut lines = diff.split_inclusive('\n').peekable();

    while let Some(line) = lines.next() {
        if line.starts_with("--- ") {
            let old = header_path(line, "--- ")?;
            let next = lines.next().ok_or_else(|| bad("missing '+++' header"))?;
            let new = header_path(next, "+++ ")?;
            let path = match (old.strip_prefix("a/"), new.strip_prefix("b/")) {
                (Some(_), Some(stripped)) => stripped.to_string(),
                _ => new,
            };
            patches.push(FilePatch {
                path,
                hunks: Vec::new(),
            });
        } else if line.starts_with("@@") {
            let patch = patches
                .last_mut()
                .ok_or_else(|| bad("hunk before any file header"))?;
            let hunk = parse_hunk(line, &mut lines)?;
            patch.hunks.push(hunk);
        }
        // anything else ("diff --git", "index ...") is ignored
    }
    Ok(patches)
}

impl FilePatch {
    /// Applies the patch to `original`; every context and removed line must match exactly.
    pub fn apply(&self, original: &str) -> Result<String> {
        let old: Vec<&str> = original.split_inclusive('\n').collect();
        let mut out = String::with_capacity(original.len());
        let mut cursor = 0;

        for hunk in &self.hunks {
            // an empty old range starts after line `old_start`
            let start = if hunk.old_len == 0 {
                hunk.old_start
            } else {
                hunk.old_start.saturating_sub(1)
            };
            if start < cursor || start > old.len() {
                return Err(bad(format!("hunk at line {} does not apply to {}", hunk.old_start, self.path)));
            }
            for line in &old[cursor..start] {
                out.push_str(line);
            }
            cursor = start;

            for line in &hunk.lines {
                match line {
                    HunkLine::Context(text) | HunkLine::Remove(text) => {
                        if old.get(cursor) != Some(&text.as_str()) {
                            return Err(bad(format!(
                                "hunk at line {} does not apply to {}: mismatch at line {}",
                                hunk.old_start,
                                self.path,
                                cursor + 1
                            )));
                        }
                        if let HunkLine::Context(text) = line {
                            out.push_str(text);
                        }
                        cursor += 1;
                    }
                    HunkLine::Add(text) => out.push_str(text),
                }
            }
        }

        for line in &old[cursor..] {
            out.push_str(line);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_ranges() {
        assert_eq!(parse_hunk_header("@@ -1,3 +1,4 @@\n").unwrap(), (1, 3, 1, 4));
        assert_eq!(parse_hunk_header("@@ -5 +5 @@ fn main()\n").unwrap(), (5, 1, 5, 1));
        assert!(parse_hunk_header("@@ 1,3 +1,4 @@\n").is_err());
    }

    #[test]
    fn strips_git_prefixes() {
        let diff = "--- a/src/x.c\n+++ b/src/x.c\n@@ -1 +1 @@\n-a\n+b\n";
        let patches = parse(diff).unwrap();
        assert_eq!(patches[0].path, "src/x.c");
    }

    #[test]
    fn missing_newline_marker_applies_to_last_line() {
        let diff = "--- f\n+++ f\n@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+c\n\\ No newline at end of file\n";
        let patches = parse(diff).unwrap();
        assert_eq!(patches[0].apply("a\nb").unwrap(), "a\nc");
    }
}
