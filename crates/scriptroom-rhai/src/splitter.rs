//! Splitting a script into top-level units.
//!
//! Rhai terminates statements with `;`, except statements that end in a
//! block (`if`, `while`, `fn`, ...). The splitter tracks bracket depth and
//! skips strings and comments so that only top-level terminators count.

use std::ops::Range;

/// Keywords that introduce a unit which never yields a value.
const STATEMENT_KEYWORDS: &[&str] = &[
    "let", "const", "fn", "private", "import", "export", "return", "throw", "while", "loop",
    "for", "do", "break", "continue",
];

/// Keywords that continue a unit after its closing brace.
const CONTINUATION_KEYWORDS: &[&str] = &["else", "catch"];

/// Whether a unit is evaluated for its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// The unit's value becomes the result's return value.
    Expression,
    /// The unit is run for its effects only.
    Statement,
}

/// One top-level unit of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    /// Source text of the unit, without surrounding whitespace or the
    /// terminating `;`.
    pub source: String,
    /// Byte range of `source` within the script.
    pub span: Range<usize>,
    /// 1-based line on which the unit starts.
    pub line: usize,
    /// Expression or statement.
    pub kind: UnitKind,
}

/// Iterator over the units of a script, in source order.
///
/// Produced by [`split_units`]. The iterator is finite and cannot be
/// restarted.
pub struct Units<'a> {
    script: &'a str,
    pos: usize,
}

/// Split a script into top-level units.
///
/// The splitter is lexical: it does not validate the script. Callers check
/// the whole script with the engine's parser first.
pub fn split_units(script: &str) -> Units<'_> {
    Units { script, pos: 0 }
}

impl Iterator for Units<'_> {
    type Item = ExecutionUnit;

    fn next(&mut self) -> Option<ExecutionUnit> {
        loop {
            let bytes = self.script.as_bytes();
            let start = skip_trivia(bytes, self.pos);
            if start >= bytes.len() {
                self.pos = bytes.len();
                return None;
            }
            let (end, next) = scan_unit(bytes, start);
            self.pos = next;

            let raw = &self.script[start..end];
            let source = raw.trim_end();
            if source.is_empty() {
                // A stray `;`.
                continue;
            }
            let span = start..start + source.len();
            return Some(ExecutionUnit {
                source: source.to_string(),
                line: line_of(self.script, start),
                kind: classify(source),
                span,
            });
        }
    }
}

/// Scan one unit starting at `start` (which is not whitespace or comment).
///
/// Returns the end of the unit's text (exclusive, before any `;`) and the
/// position to resume scanning from.
fn scan_unit(bytes: &[u8], start: usize) -> (usize, usize) {
    let leading = word_at(bytes, start);
    let block_unit = starts_block_unit(leading, bytes, start);
    let mut depth = 0usize;
    let mut body_open = false;
    let mut i = start;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => i = skip_string(bytes, i),
            b'`' => i = skip_template(bytes, i),
            b'\'' => i = skip_char(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'{' => {
                // `#{` opens an object map, not a body.
                if depth == 0 && block_unit && (i == 0 || bytes[i - 1] != b'#') {
                    body_open = true;
                }
                depth += 1;
                i += 1;
            }
            b'(' | b'[' => {
                depth += 1;
                i += 1;
            }
            b')' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            b'}' => {
                depth = depth.saturating_sub(1);
                i += 1;
                if depth == 0 {
                    let closes_body = std::mem::take(&mut body_open);
                    let next = skip_trivia(bytes, i);
                    match bytes.get(next) {
                        None => return (i, next),
                        Some(b';') => return (i, next + 1),
                        Some(_) if continues_after_brace(leading, bytes, next) => {}
                        // A statement ending in a block needs no terminator.
                        Some(_) if closes_body => return (i, i),
                        Some(_)
                            if !block_unit
                                && starts_new_unit(bytes, next)
                                && has_newline(&bytes[i..next]) =>
                        {
                            return (i, i);
                        }
                        Some(_) => {}
                    }
                }
            }
            b';' if depth == 0 => return (i, i + 1),
            _ => i += 1,
        }
    }
    (bytes.len(), bytes.len())
}

/// A unit whose leading keyword makes a trailing block its terminator.
fn starts_block_unit(leading: &str, bytes: &[u8], start: usize) -> bool {
    matches!(
        leading,
        "if" | "while" | "loop" | "for" | "do" | "fn" | "private" | "try" | "switch"
    ) || bytes.get(start) == Some(&b'{')
}

/// Anything that isn't an operator or accessor continuing the previous
/// expression.
fn starts_new_unit(bytes: &[u8], pos: usize) -> bool {
    match bytes.get(pos) {
        Some(b) => b.is_ascii_alphanumeric() || matches!(b, b'_' | b'"' | b'`' | b'\'' | b'{'),
        None => true,
    }
}

/// `else`/`catch` follow a closing brace; `do { } while x` does too.
fn continues_after_brace(leading: &str, bytes: &[u8], pos: usize) -> bool {
    let word = word_at(bytes, pos);
    CONTINUATION_KEYWORDS.contains(&word) || (leading == "do" && matches!(word, "while" | "until"))
}

fn classify(source: &str) -> UnitKind {
    let word = word_at(source.as_bytes(), 0);
    if STATEMENT_KEYWORDS.contains(&word) {
        UnitKind::Statement
    } else {
        UnitKind::Expression
    }
}

/// The identifier starting at `pos`, or `""`.
fn word_at(bytes: &[u8], pos: usize) -> &str {
    let end = bytes[pos.min(bytes.len())..]
        .iter()
        .position(|b| !(b.is_ascii_alphanumeric() || *b == b'_'))
        .map_or(bytes.len(), |n| pos + n);
    std::str::from_utf8(&bytes[pos.min(end)..end]).unwrap_or("")
}

fn has_newline(bytes: &[u8]) -> bool {
    bytes.contains(&b'\n')
}

fn line_of(script: &str, offset: usize) -> usize {
    script[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Skip whitespace and comments.
fn skip_trivia(bytes: &[u8], mut i: usize) -> usize {
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match (bytes.get(i), bytes.get(i + 1)) {
            (Some(b'/'), Some(b'/')) => i = skip_line_comment(bytes, i),
            (Some(b'/'), Some(b'*')) => i = skip_block_comment(bytes, i),
            _ => return i,
        }
    }
}

fn skip_line_comment(bytes: &[u8], i: usize) -> usize {
    bytes[i..]
        .iter()
        .position(|b| *b == b'\n')
        .map_or(bytes.len(), |n| i + n)
}

/// Block comments nest in Rhai.
fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    let mut level = 0usize;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                level += 1;
                i += 2;
            }
            (b'*', Some(b'/')) => {
                level -= 1;
                i += 2;
                if level == 0 {
                    return i;
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_string(bytes: &[u8], mut i: usize) -> usize {
    i += 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_char(bytes: &[u8], mut i: usize) -> usize {
    i += 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' => return i + 1,
            b'\n' => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Back-tick strings may interpolate `${ ... }`, which can itself contain
/// strings and braces.
fn skip_template(bytes: &[u8], mut i: usize) -> usize {
    i += 1;
    while i < bytes.len() {
        match bytes[i] {
            b'`' => return i + 1,
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                i += 2;
                let mut depth = 1usize;
                while i < bytes.len() && depth > 0 {
                    match bytes[i] {
                        b'"' => i = skip_string(bytes, i),
                        b'`' => i = skip_template(bytes, i),
                        b'{' => {
                            depth += 1;
                            i += 1;
                        }
                        b'}' => {
                            depth -= 1;
                            i += 1;
                        }
                        _ => i += 1,
                    }
                }
            }
            _ => i += 1,
        }
    }
    bytes.len()
}
