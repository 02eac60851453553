use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record exactly as the API returned it, in field order.
pub type RawRecord = IndexMap<String, Value>;

/// Kind of a remote record. Containers become documents, the rest render as
/// checkbox lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Category,
    Project,
    Task,
    Faux,
}

impl ItemKind {
    /// Normalize a remote `type` value. Missing, empty and unrecognized types
    /// are tasks.
    pub fn from_type(value: Option<&str>) -> ItemKind {
        match value.map(str::trim) {
            Some("category") => ItemKind::Category,
            Some("project") => ItemKind::Project,
            Some("faux") => ItemKind::Faux,
            _ => ItemKind::Task,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Category => "category",
            ItemKind::Project => "project",
            ItemKind::Task => "task",
            ItemKind::Faux => "faux",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, ItemKind::Category | ItemKind::Project)
    }
}

/// Where a record hangs in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// Top of the category tree (`root`, or no parent at all)
    Root,
    /// The inbox (`unassigned`)
    Unassigned,
    Id(String),
}

impl ParentRef {
    pub const ROOT: &'static str = "root";
    pub const UNASSIGNED: &'static str = "unassigned";

    pub fn parse(value: Option<&str>) -> ParentRef {
        match value.map(str::trim) {
            None | Some("") | Some(Self::ROOT) => ParentRef::Root,
            Some(Self::UNASSIGNED) => ParentRef::Unassigned,
            Some(id) => ParentRef::Id(id.to_string()),
        }
    }

    /// Value used for the `parentId` query parameter.
    pub fn as_query(&self) -> &str {
        match self {
            ParentRef::Root => Self::ROOT,
            ParentRef::Unassigned => Self::UNASSIGNED,
            ParentRef::Id(id) => id,
        }
    }
}

/// Builds links back into the web app. Tasks use `#t=`, containers `#p=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinks {
    app_url: String,
}

impl DeepLinks {
    pub fn new(app_url: &str) -> Self {
        let mut app_url = app_url.trim().to_string();
        if !app_url.ends_with('/') {
            app_url.push('/');
        }
        DeepLinks { app_url }
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    pub fn for_item(&self, kind: ItemKind, id: &str) -> String {
        let marker = if kind.is_container() { 'p' } else { 't' };
        format!("{}#{}={}", self.app_url, marker, id)
    }
}

/// Fill in the derived fields of a freshly fetched record: a normalized
/// `type` and a `deepLink`.
pub fn decorate(mut raw: RawRecord, links: &DeepLinks) -> RawRecord {
    let kind = ItemKind::from_type(raw.get("type").and_then(Value::as_str));
    let needs_type = match raw.get("type") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    };
    if needs_type {
        raw.insert("type".to_string(), Value::String(kind.as_str().to_string()));
    }
    if let Some(id) = record_id(&raw) {
        let link = links.for_item(kind, &id);
        raw.insert("deepLink".to_string(), Value::String(link));
    }
    raw
}

/// A category or project.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    pub parent: ParentRef,
    pub note: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_recurring: bool,
    pub priority: Option<String>,
    pub deep_link: String,
    /// Every field received, used for front-matter
    pub fields: RawRecord,
}

impl CategoryRecord {
    /// Returns `None` for records without an identity.
    pub fn from_raw(raw: RawRecord) -> Option<Self> {
        let id = record_id(&raw)?;
        Some(CategoryRecord {
            title: str_field(&raw, "title").unwrap_or_default(),
            kind: ItemKind::from_type(raw.get("type").and_then(Value::as_str)),
            parent: ParentRef::parse(raw.get("parentId").and_then(Value::as_str)),
            note: str_field(&raw, "note"),
            start_date: str_field(&raw, "startDate"),
            end_date: str_field(&raw, "endDate"),
            is_recurring: bool_field(&raw, "isRecurring"),
            priority: str_field(&raw, "priority"),
            deep_link: str_field(&raw, "deepLink").unwrap_or_default(),
            id,
            fields: raw,
        })
    }
}

/// A task, possibly with nested subtasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub done: bool,
    pub kind: ItemKind,
    pub parent: ParentRef,
    pub due_date: Option<String>,
    pub start_date: Option<String>,
    /// Scheduled day; the `unassigned` sentinel is dropped
    pub day: Option<String>,
    pub note: Option<String>,
    pub deep_link: String,
    pub subtasks: Vec<TaskRecord>,
}

impl TaskRecord {
    pub fn from_raw(raw: &RawRecord) -> Self {
        TaskRecord {
            id: record_id(raw).unwrap_or_default(),
            title: str_field(raw, "title").unwrap_or_default(),
            done: bool_field(raw, "done"),
            kind: ItemKind::from_type(raw.get("type").and_then(Value::as_str)),
            parent: ParentRef::parse(raw.get("parentId").and_then(Value::as_str)),
            due_date: str_field(raw, "dueDate"),
            start_date: str_field(raw, "startDate"),
            day: str_field(raw, "day").filter(|d| d != ParentRef::UNASSIGNED),
            note: str_field(raw, "note"),
            deep_link: str_field(raw, "deepLink").unwrap_or_default(),
            subtasks: raw.get("subtasks").map(subtasks_from).unwrap_or_default(),
        }
    }
}

/// Subtasks arrive either as an array or as an object keyed by id.
fn subtasks_from(value: &Value) -> Vec<TaskRecord> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::Object(map) => {
                let raw: RawRecord = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                Some(TaskRecord::from_raw(&raw))
            }
            _ => None,
        })
        .collect()
}

/// A child of a category: either a nested container or a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Container(CategoryRecord),
    Task(TaskRecord),
}

impl Item {
    /// Classify a decorated record. Containers without an id are dropped.
    pub fn from_raw(raw: RawRecord) -> Option<Item> {
        let kind = ItemKind::from_type(raw.get("type").and_then(Value::as_str));
        if kind.is_container() {
            CategoryRecord::from_raw(raw).map(Item::Container)
        } else {
            Some(Item::Task(TaskRecord::from_raw(&raw)))
        }
    }
}

/// Identity of a record: `_id` on the wire, `id` on some endpoints.
pub fn record_id(raw: &RawRecord) -> Option<String> {
    str_field(raw, "_id").or_else(|| str_field(raw, "id"))
}

fn str_field(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn bool_field(raw: &RawRecord, key: &str) -> bool {
    raw.get(key).and_then(Value::as_bool).unwrap_or(false)
}
