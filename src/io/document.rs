use std::fs;
use std::io;
use std::path::Path;

use crate::io::vault::atomic_write;

/// Insert `block` before 0-based `line` of the file at `path` (the cursor),
/// or append when `line` is `None` or past the end. A missing file is
/// treated as empty.
pub fn insert_at_line(path: &Path, line: Option<usize>, block: &str) -> io::Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    let updated = splice_lines(&existing, line, block);
    atomic_write(path, updated.as_bytes())
}

/// Insert the block's lines before line `line`, writing them with the
/// file's own line ending. A file without a final newline keeps that shape.
fn splice_lines(existing: &str, line: Option<usize>, block: &str) -> String {
    let eol = if existing.contains("\r\n") { "\r\n" } else { "\n" };
    let lines: Vec<&str> = existing.split_inclusive('\n').collect();
    let at = line.unwrap_or(lines.len()).min(lines.len());
    let open_end = !existing.is_empty() && !existing.ends_with('\n');

    let mut inserted = block.lines().map(|l| format!("{}{}", l, eol)).collect::<Vec<_>>();
    let mut out = String::with_capacity(existing.len() + block.len());
    for l in &lines[..at] {
        out.push_str(l);
    }
    if at == lines.len() && open_end && !inserted.is_empty() {
        out.push_str(eol);
        if let Some(last) = inserted.last_mut() {
            last.truncate(last.len() - eol.len());
        }
    }
    for l in &inserted {
        out.push_str(l);
    }
    for l in &lines[at..] {
        out.push_str(l);
    }
    out
}
