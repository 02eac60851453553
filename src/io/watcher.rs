use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::debug;

use crate::ops::completion::{Completion, change_between, detect_completions, viewport_around};

/// Watches one markdown document and reports tasks checked off in it.
///
/// Editors usually save by renaming a temp file over the target, so the
/// parent directory is watched and events are filtered by file name.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<()>,
    tracker: CompletionTracker,
}

impl DocumentWatcher {
    pub fn start(path: &Path, viewport_lines: usize) -> Result<Self, notify::Error> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let name: Option<OsString> = path.file_name().map(|n| n.to_os_string());
        let initial = fs::read_to_string(path).unwrap_or_default();

        let (tx, rx) = mpsc::channel();
        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(_) => return,
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) => {}
                    _ => return,
                }
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == name);
                if ours {
                    let _ = tx.send(());
                }
            },
            Config::default(),
        )?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(DocumentWatcher {
            _watcher: watcher,
            rx,
            tracker: CompletionTracker::new(path.to_path_buf(), initial, viewport_lines),
        })
    }

    /// Document content as of the last poll.
    pub fn snapshot(&self) -> &str {
        &self.tracker.snapshot
    }

    /// Non-blocking. Re-reads the document when it changed since the last
    /// poll and returns the completions the change introduced.
    pub fn poll(&mut self) -> io::Result<Vec<Completion>> {
        let mut changed = false;
        while self.rx.try_recv().is_ok() {
            changed = true;
        }
        if !changed {
            return Ok(Vec::new());
        }
        self.tracker.refresh()
    }
}

/// The last seen content of a document plus the viewport used to scope
/// detection around each edit.
pub struct CompletionTracker {
    path: PathBuf,
    snapshot: String,
    viewport_lines: usize,
}

impl CompletionTracker {
    pub fn new(path: PathBuf, snapshot: String, viewport_lines: usize) -> Self {
        CompletionTracker {
            path,
            snapshot,
            viewport_lines,
        }
    }

    /// Read the document from disk and diff it against the snapshot.
    pub fn refresh(&mut self) -> io::Result<Vec<Completion>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            // Mid-rename; the next event carries the new file.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(self.apply(text))
    }

    pub fn apply(&mut self, text: String) -> Vec<Completion> {
        let Some(change) = change_between(&self.snapshot, &text) else {
            return Vec::new();
        };
        // One span can cover edits at both ends of the document.
        let visible = [
            viewport_around(&text, change.inserted.start, self.viewport_lines),
            viewport_around(&text, change.inserted.end, self.viewport_lines),
        ];
        debug!(
            path = %self.path.display(),
            inserted = ?change.inserted,
            "document changed"
        );
        let found = detect_completions(&text, &visible, &[change]);
        self.snapshot = text;
        found
    }
}
