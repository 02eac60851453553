use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::io::remote::{RemoteError, TaskService};
use crate::io::vault::Vault;
use crate::model::config::{Settings, TodayFilter};
use crate::model::record::{CategoryRecord, Item, ParentRef, RawRecord, record_id};
use crate::ops::format::Formatter;
use crate::ops::hierarchy::{CategoryIndex, inbox_path};

/// Something a sync pass could not mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Document path, or a label for pass-level fetches
    pub target: String,
    pub reason: String,
}

/// Outcome of one sync pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Paths written, in category order
    pub written: Vec<String>,
    pub skipped: Vec<SyncFailure>,
    pub inbox_written: bool,
}

impl SyncReport {
    pub fn summary(&self) -> String {
        format!(
            "{} documents written, {} skipped, inbox {}",
            self.written.len(),
            self.skipped.len(),
            if self.inbox_written { "written" } else { "skipped" }
        )
    }
}

/// Mirrors the remote hierarchy into a vault.
pub struct Mirror<'a, S: TaskService, V: Vault> {
    service: &'a S,
    vault: &'a V,
    settings: &'a Settings,
}

impl<'a, S: TaskService, V: Vault> Mirror<'a, S, V> {
    pub fn new(service: &'a S, vault: &'a V, settings: &'a Settings) -> Self {
        Mirror {
            service,
            vault,
            settings,
        }
    }

    fn base_dir(&self) -> &'a str {
        &self.settings.sync.base_dir
    }

    /// Rebuild the mirrored tree. Best effort: failures are logged and
    /// reported, never returned.
    pub fn sync(&self) -> SyncReport {
        let mut report = SyncReport::default();
        let base = self.base_dir();

        if let Err(e) = self.vault.remove_tree(base) {
            warn!(base, error = %e, "could not clear mirror directory");
        }

        let categories: Vec<CategoryRecord> = match self.service.categories() {
            Ok(raw) => raw.into_iter().filter_map(CategoryRecord::from_raw).collect(),
            Err(e) => {
                error!(error = %e, "could not fetch categories");
                report.skipped.push(SyncFailure {
                    target: "categories".to_string(),
                    reason: e.to_string(),
                });
                Vec::new()
            }
        };

        let index = CategoryIndex::build(&categories);
        let formatter = Formatter::new(&index, base, self.settings.format);

        let outcomes = run_bounded(&categories, self.settings.sync.concurrency, |category| {
            self.mirror_category(&index, &formatter, category)
        });
        for outcome in outcomes {
            match outcome {
                Ok(path) => report.written.push(path),
                Err(failure) => {
                    warn!(path = %failure.target, reason = %failure.reason, "skipped category");
                    report.skipped.push(failure);
                }
            }
        }

        match self.mirror_inbox(&formatter) {
            Ok(()) => report.inbox_written = true,
            Err(failure) => {
                warn!(reason = %failure.reason, "skipped inbox");
                report.skipped.push(failure);
            }
        }

        info!(
            written = report.written.len(),
            skipped = report.skipped.len(),
            "sync finished"
        );
        report
    }

    fn mirror_category(
        &self,
        index: &CategoryIndex,
        formatter: &Formatter,
        category: &CategoryRecord,
    ) -> Result<String, SyncFailure> {
        let path = index.resolve_path(self.base_dir(), category);
        let fail = |reason: String| SyncFailure {
            target: path.clone(),
            reason,
        };

        let children = self
            .service
            .children(&ParentRef::Id(category.id.clone()))
            .map_err(|e| fail(e.to_string()))?;
        let items = to_items(children);
        let content = formatter.format_category(category, &items);
        self.vault
            .write_file(&path, &content)
            .map_err(|e| fail(e.to_string()))?;
        debug!(%path, items = items.len(), "wrote category");
        Ok(path)
    }

    fn mirror_inbox(&self, formatter: &Formatter) -> Result<(), SyncFailure> {
        let path = inbox_path(self.base_dir());
        let fail = |reason: String| SyncFailure {
            target: path.clone(),
            reason,
        };
        let children = self
            .service
            .children(&ParentRef::Unassigned)
            .map_err(|e| fail(e.to_string()))?;
        let items = to_items(children);
        self.vault
            .write_file(&path, &formatter.format_inbox(&items))
            .map_err(|e| fail(e.to_string()))?;
        debug!(%path, items = items.len(), "wrote inbox");
        Ok(())
    }

    /// Text block of the items due and/or scheduled on `date`, for insertion
    /// at a cursor. Reads only; nothing is written.
    pub fn today(&self, date: NaiveDate, filter: TodayFilter) -> Result<String, RemoteError> {
        let mut raw = Vec::new();
        if filter.includes_due() {
            raw.extend(self.service.due_items(date)?);
        }
        if filter.includes_scheduled() {
            raw.extend(self.service.scheduled_items(date)?);
        }

        let mut seen = HashSet::new();
        raw.retain(|record| match record_id(record) {
            Some(id) => seen.insert(id),
            None => true,
        });

        let items = to_items(raw);
        let no_categories: Vec<CategoryRecord> = Vec::new();
        let index = CategoryIndex::build(&no_categories);
        let formatter = Formatter::new(&index, self.base_dir(), self.settings.format);
        Ok(formatter.format_items(&items, 1, false))
    }
}

fn to_items(raw: Vec<RawRecord>) -> Vec<Item> {
    raw.into_iter().filter_map(Item::from_raw).collect()
}

/// Apply `work` to every record with at most `limit` running at once.
/// Results come back in input order.
fn run_bounded<T, R, F>(inputs: &[T], limit: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = limit.max(1).min(inputs.len());
    if workers <= 1 {
        return inputs.iter().map(&work).collect();
    }

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();
    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let work = &work;
            scope.spawn(move || {
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(input) = inputs.get(i) else { break };
                    if tx.send((i, work(input))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(tx);

    let mut results: Vec<(usize, R)> = rx.into_iter().collect();
    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, r)| r).collect()
}
