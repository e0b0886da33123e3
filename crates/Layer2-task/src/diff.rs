//! Unified diff parsing and application
//!
//! Supports `@@ -a,b +c,d @@` hunks with context (` `), deletion (`-`) and
//! addition (`+`) lines plus `\ No newline at end of file`. File headers
//! (`---`, `+++`, `diff`, `index`) are skipped.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch contains no hunks")]
    NoHunks,

    #[error("malformed hunk header at line {line}: {header}")]
    BadHeader { line: usize, header: String },

    #[error("unexpected line {line} in hunk: {text}")]
    BadLine { line: usize, text: String },

    #[error("hunk {hunk} does not match the file (expected at line {expected}: {first:?})")]
    Mismatch {
        hunk: usize,
        expected: usize,
        first: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    pub lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines the hunk expects to find in the original
    fn old_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Remove(s) => Some(s.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }

    /// Lines the hunk leaves in their place
    fn new_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match l {
            HunkLine::Context(s) | HunkLine::Add(s) => Some(s.as_str()),
            HunkLine::Remove(_) => None,
        })
    }

    /// Zero-based index in the original where this hunk should start
    fn stated_position(&self) -> usize {
        if self.old_len == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub hunks: Vec<Hunk>,
    /// Marker seen after a removed or context line
    old_missing_newline: bool,
    /// Marker seen after an added or context line
    new_missing_newline: bool,
}

fn hunk_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
            .expect("hunk header pattern compiles")
    })
}

fn is_file_header(line: &str) -> bool {
    line.starts_with("--- ")
        || line.starts_with("+++ ")
        || line.starts_with("diff ")
        || line.starts_with("index ")
}

impl Patch {
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let mut patch = Patch::default();
        let mut current: Option<Hunk> = None;
        let (mut old_seen, mut new_seen) = (0usize, 0usize);

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;

            if raw.starts_with("@@") {
                if let Some(hunk) = current.take() {
                    patch.hunks.push(hunk);
                }
                let caps = hunk_header().captures(raw).ok_or_else(|| PatchError::BadHeader {
                    line: line_no,
                    header: raw.to_string(),
                })?;
                let num = |i: usize, default: usize| {
                    caps.get(i)
                        .and_then(|m| m.as_str().parse().ok())
                        .unwrap_or(default)
                };
                current = Some(Hunk {
                    old_start: num(1, 0),
                    old_len: num(2, 1),
                    new_start: num(3, 0),
                    new_len: num(4, 1),
                    lines: Vec::new(),
                });
                old_seen = 0;
                new_seen = 0;
                continue;
            }

            let Some(hunk) = current.as_mut() else {
                // Preamble and file headers before the first hunk
                continue;
            };

            let complete = old_seen >= hunk.old_len && new_seen >= hunk.new_len;
            if raw.starts_with('\\') {
                match hunk.lines.last() {
                    Some(HunkLine::Remove(_)) => patch.old_missing_newline = true,
                    Some(HunkLine::Add(_)) => patch.new_missing_newline = true,
                    Some(HunkLine::Context(_)) => {
                        patch.old_missing_newline = true;
                        patch.new_missing_newline = true;
                    }
                    None => {}
                }
                continue;
            }
            if complete {
                if is_file_header(raw) || raw.trim().is_empty() {
                    continue;
                }
                return Err(PatchError::BadLine {
                    line: line_no,
                    text: raw.to_string(),
                });
            }

            let (marker, body) = match raw.char_indices().nth(1) {
                Some((i, _)) => (&raw[..i], &raw[i..]),
                None => (raw, ""),
            };
            match marker {
                " " | "" => {
                    hunk.lines.push(HunkLine::Context(body.to_string()));
                    old_seen += 1;
                    new_seen += 1;
                }
                "-" => {
                    hunk.lines.push(HunkLine::Remove(body.to_string()));
                    old_seen += 1;
                }
                "+" => {
                    hunk.lines.push(HunkLine::Add(body.to_string()));
                    new_seen += 1;
                }
                _ => {
                    return Err(PatchError::BadLine {
                        line: line_no,
                        text: raw.to_string(),
                    })
                }
            }
        }

        if let Some(hunk) = current.take() {
            patch.hunks.push(hunk);
        }
        if patch.hunks.is_empty() {
            return Err(PatchError::NoHunks);
        }
        Ok(patch)
    }

    /// Apply to `original`, verifying every context and deletion line.
    ///
    /// Each hunk is tried at its stated position first, then at the first
    /// exact match after the previous hunk.
    pub fn apply(&self, original: &str) -> Result<String, PatchError> {
        let source: Vec<&str> = original.lines().collect();
        let mut output: Vec<&str> = Vec::with_capacity(source.len());
        let mut cursor = 0;
        let mut touches_end = false;

        for (idx, hunk) in self.hunks.iter().enumerate() {
            let old = hunk.old_lines();
            let stated = hunk.stated_position().min(source.len());

            let position = if matches_at(&source, &old, stated, cursor) {
                Some(stated)
            } else if old.is_empty() {
                Some(cursor)
            } else {
                (cursor..=source.len().saturating_sub(old.len()))
                    .find(|&pos| matches_at(&source, &old, pos, cursor))
            };
            let Some(position) = position else {
                return Err(PatchError::Mismatch {
                    hunk: idx + 1,
                    expected: stated + 1,
                    first: old.first().map(|s| s.to_string()).unwrap_or_default(),
                });
            };

            output.extend_from_slice(&source[cursor..position]);
            output.extend(hunk.new_lines());
            cursor = position + old.len();
            touches_end = cursor == source.len();
        }
        output.extend_from_slice(&source[cursor..]);

        if output.is_empty() {
            return Ok(String::new());
        }

        let trailing_newline = if touches_end && self.new_missing_newline {
            false
        } else if touches_end && self.old_missing_newline {
            true
        } else {
            original.is_empty() || original.ends_with('\n')
        };

        let mut result = output.join("\n");
        if trailing_newline {
            result.push('\n');
        }
        Ok(result)
    }
}

fn matches_at(source: &[&str], expected: &[&str], pos: usize, cursor: usize) -> bool {
    pos >= cursor
        && pos + expected.len() <= source.len()
        && source[pos..pos + expected.len()]
            .iter()
            .zip(expected)
            .all(|(have, want)| have.trim_end_matches('\r') == want.trim_end_matches('\r'))
}
