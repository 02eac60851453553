use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::model::record::{CategoryRecord, ParentRef};

/// File name of the document collecting unparented items.
pub const INBOX_FILE: &str = "Inbox.md";

/// Keep only `[A-Za-z0-9 -]`. An empty result is still a valid segment.
pub fn sanitize_segment(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
        .collect()
}

/// Lookup over one pass's flat category set.
///
/// Built once per sync and read by both the path resolver and the formatter.
/// Folder status is derived here from the whole set, so it always reflects
/// the records this index was built from.
pub struct CategoryIndex<'a> {
    records: &'a [CategoryRecord],
    by_id: HashMap<&'a str, &'a CategoryRecord>,
    /// Ids that have at least one category or project child
    folders: HashSet<&'a str>,
}

impl<'a> CategoryIndex<'a> {
    pub fn build(records: &'a [CategoryRecord]) -> Self {
        let mut by_id = HashMap::with_capacity(records.len());
        let mut folders = HashSet::new();
        for record in records {
            by_id.entry(record.id.as_str()).or_insert(record);
            if record.kind.is_container()
                && let ParentRef::Id(parent) = &record.parent
                && parent != &record.id
            {
                folders.insert(parent.as_str());
            }
        }
        CategoryIndex {
            records,
            by_id,
            folders,
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a CategoryRecord> {
        self.by_id.get(id).copied()
    }

    /// The parent record, if it exists in this set. Self-parents count as root.
    pub fn parent_of(&self, record: &CategoryRecord) -> Option<&'a CategoryRecord> {
        match &record.parent {
            ParentRef::Id(parent) if parent != &record.id => self.get(parent),
            _ => None,
        }
    }

    /// Ancestors nearest-first. Stops at the root, at a dangling parent, or
    /// when a cycle would revisit a record.
    pub fn ancestors(&self, record: &CategoryRecord) -> Vec<&'a CategoryRecord> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(record.id.as_str());
        let mut next = self.parent_of(record);
        while let Some(parent) = next {
            if !seen.insert(parent.id.as_str()) {
                break;
            }
            chain.push(parent);
            next = self.parent_of(parent);
        }
        chain
    }

    /// True when some category or project in the set names `id` as parent.
    pub fn is_folder(&self, id: &str) -> bool {
        self.folders.contains(id)
    }

    /// Vault path of the document for `record`.
    ///
    /// `Base/Root/Child.md` for a leaf, `Base/Root/Child/Child.md` when the
    /// record has category or project children of its own.
    pub fn resolve_path(&self, base_dir: &str, record: &CategoryRecord) -> String {
        let mut segments: Vec<String> = self
            .ancestors(record)
            .iter()
            .rev()
            .map(|a| sanitize_segment(&a.title))
            .collect();
        let own = sanitize_segment(&record.title);
        segments.push(own.clone());

        let mut path = join_base(base_dir, &segments.join("/"));
        if self.is_folder(&record.id) {
            path.push('/');
            path.push_str(&own);
        }
        path.push_str(".md");
        path
    }

    /// `/Grandparent/Parent/Title`, the sort key for category pickers.
    pub fn full_title_path(&self, record: &CategoryRecord) -> String {
        let mut path = String::new();
        for ancestor in self.ancestors(record).iter().rev() {
            path.push('/');
            path.push_str(&ancestor.title);
        }
        path.push('/');
        path.push_str(&record.title);
        path
    }

    /// `Title in Grandparent/Parent`, or just the title at the root.
    pub fn display_title(&self, record: &CategoryRecord) -> String {
        let ancestors = self.ancestors(record);
        if ancestors.is_empty() {
            return record.title.clone();
        }
        let trail: Vec<&str> = ancestors.iter().rev().map(|a| a.title.as_str()).collect();
        format!("{} in {}", record.title, trail.join("/"))
    }

    /// All records alphabetized by full hierarchical path.
    pub fn picker_order(&self) -> Vec<&'a CategoryRecord> {
        let mut keyed: Vec<(String, &'a CategoryRecord)> = self
            .records
            .iter()
            .map(|r| (self.full_title_path(r), r))
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_titles(a, b));
        keyed.into_iter().map(|(_, r)| r).collect()
    }

    /// Find a category by id, then by case-insensitive title.
    pub fn find(&self, selector: &str) -> Option<&'a CategoryRecord> {
        let selector = selector.trim();
        self.get(selector).or_else(|| {
            self.records
                .iter()
                .find(|r| r.title.eq_ignore_ascii_case(selector))
        })
    }
}

/// Convenience over a one-off index.
pub fn resolve_path(base_dir: &str, record: &CategoryRecord, categories: &[CategoryRecord]) -> String {
    CategoryIndex::build(categories).resolve_path(base_dir, record)
}

/// Vault path of the inbox document.
pub fn inbox_path(base_dir: &str) -> String {
    join_base(base_dir, INBOX_FILE)
}

fn join_base(base_dir: &str, rest: &str) -> String {
    let base = base_dir.trim_end_matches('/');
    if base.is_empty() {
        rest.to_string()
    } else {
        format!("{}/{}", base, rest)
    }
}

fn compare_titles(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}
