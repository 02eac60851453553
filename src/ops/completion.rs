//! Detects tasks checked off in a live document.
//!
//! Detection is a pure function of the current text, the visible byte
//! ranges and the regions touched by the latest edit batch. Only lines that
//! are both visible and touched are inspected; cost is bounded by the
//! viewport and never by the document length.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// `- [x]`, `* [ ]`, `+ [>]` with optional indentation. Captures the status.
static CHECKBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+\[(.)\]").expect("checkbox pattern"));

/// A task deep-link anchor. `#p=` project anchors do not match.
static TASK_ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[⚓\]\([^)\s]*#t=([^)\s&#]+)\)").expect("anchor pattern"));

/// Status characters meaning "done".
pub const DONE_MARKERS: [char; 2] = ['x', 'X'];

/// Bytes inserted by one edit, as a range into the new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    pub inserted: Range<usize>,
}

impl TextChange {
    pub fn new(inserted: Range<usize>) -> Self {
        TextChange { inserted }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
    }

    fn touches(&self, line: &Range<usize>) -> bool {
        self.inserted.start <= line.end && line.start <= self.inserted.end
    }
}

/// A task line found checked off, with the remote item it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub item_id: String,
    /// Byte offset of the line start
    pub line_start: usize,
}

/// Walks the lines overlapping a byte range without copying them.
pub struct LineCursor<'a> {
    text: &'a str,
    pos: usize,
    end: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(text: &'a str, range: Range<usize>) -> Self {
        let end = range.end.min(text.len());
        let start = range.start.min(end);
        let pos = text[..floor_char_boundary(text, start)]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        LineCursor { text, pos, end }
    }
}

impl<'a> Iterator for LineCursor<'a> {
    /// Line range (without the newline) and its text
    type Item = (Range<usize>, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos > self.end || self.pos > self.text.len() {
            return None;
        }
        if self.pos == self.text.len() && self.pos != self.end {
            return None;
        }
        let rest = &self.text[self.pos..];
        let len = rest.find('\n').unwrap_or(rest.len());
        let range = self.pos..self.pos + len;
        let line = &rest[..len];
        self.pos = range.end + 1;
        Some((range, line))
    }
}

/// Remote item id if `line` is a checked-off task carrying a task anchor.
pub fn completed_task_id(line: &str) -> Option<&str> {
    let status = CHECKBOX.captures(line)?.get(1)?.as_str().chars().next()?;
    if !DONE_MARKERS.contains(&status) {
        return None;
    }
    TASK_ANCHOR
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Scan the visible ranges for lines touched by `changes` that now read as
/// completed tasks. Each line is reported at most once per batch.
pub fn detect_completions(
    text: &str,
    visible: &[Range<usize>],
    changes: &[TextChange],
) -> Vec<Completion> {
    let changes: Vec<&TextChange> = changes.iter().filter(|c| !c.is_empty()).collect();
    if changes.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for range in visible {
        for (line_range, line) in LineCursor::new(text, range.clone()) {
            if !changes.iter().any(|c| c.touches(&line_range)) {
                continue;
            }
            if !seen.insert(line_range.start) {
                continue;
            }
            if let Some(id) = completed_task_id(line) {
                found.push(Completion {
                    item_id: id.to_string(),
                    line_start: line_range.start,
                });
            }
        }
    }
    found
}

/// The single region that differs between two snapshots, as inserted bytes
/// in `new`. A pure deletion yields an empty change.
pub fn change_between(old: &str, new: &str) -> Option<TextChange> {
    if old == new {
        return None;
    }
    let prefix = old
        .char_indices()
        .zip(new.chars())
        .find(|((_, a), b)| a != b)
        .map(|((i, _), _)| i)
        .unwrap_or_else(|| old.len().min(new.len()));
    let prefix = floor_char_boundary(new, prefix.min(new.len()));

    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old[prefix..]
        .chars()
        .rev()
        .zip(new[prefix..].chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .scan(0usize, |acc, n| {
            *acc += n;
            Some(*acc)
        })
        .take_while(|total| *total <= max_suffix)
        .last()
        .unwrap_or(0);

    Some(TextChange::new(prefix..new.len() - suffix))
}

/// Byte window of about `lines` lines centred on `at`.
pub fn viewport_around(text: &str, at: usize, lines: usize) -> Range<usize> {
    let at = floor_char_boundary(text, at.min(text.len()));
    let half = lines.max(1).div_ceil(2);

    let mut start = at;
    for _ in 0..half {
        match text[..start].rfind('\n') {
            Some(i) => start = i,
            None => {
                start = 0;
                break;
            }
        }
    }
    let mut end = at;
    for _ in 0..half {
        match text[end..].find('\n') {
            Some(i) => end += i + 1,
            None => {
                end = text.len();
                break;
            }
        }
    }
    start..end
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
