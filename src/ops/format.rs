use serde_json::Value;

use crate::model::config::FormatConfig;
use crate::model::record::{CategoryRecord, Item, RawRecord, TaskRecord};
use crate::ops::hierarchy::CategoryIndex;

/// Link text for deep-links. The completion watcher keys on it.
pub const ANCHOR: &str = "⚓";

pub const CONTAINERS_HEADING: &str = "## Categories and Projects";
pub const TASKS_HEADING: &str = "## Tasks";

/// Renders categories and their children as markdown.
pub struct Formatter<'a> {
    index: &'a CategoryIndex<'a>,
    base_dir: &'a str,
    options: FormatConfig,
}

impl<'a> Formatter<'a> {
    pub fn new(index: &'a CategoryIndex<'a>, base_dir: &'a str, options: FormatConfig) -> Self {
        Formatter {
            index,
            base_dir,
            options,
        }
    }

    /// Full document for a category or project: front-matter, heading,
    /// back-link, metadata and children.
    pub fn format_category(&self, record: &CategoryRecord, children: &[Item]) -> String {
        let mut out = front_matter(&record.fields);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&format!("# {}", single_line(&record.title)));
        if !record.deep_link.is_empty() {
            out.push_str(&format!(" {}", anchor(&record.deep_link)));
        }
        out.push_str("\n\n");

        if let Some(parent) = self.index.parent_of(record) {
            out.push_str(&format!("Back to {}\n\n", self.container_link(parent)));
        }
        out.push_str(&metadata(record));

        out.push_str(&self.format_items(children, 0, false));
        out
    }

    /// The synthetic document holding every unparented item.
    pub fn format_inbox(&self, items: &[Item]) -> String {
        let mut out = String::from("# Inbox\n\n");
        out.push_str(&self.format_items(items, 0, false));
        out
    }

    /// Render a list of children.
    ///
    /// Containers always come before tasks. Section headings appear only at
    /// depth 0 of a non-nested list. `nested` marks subtask lists: those are
    /// indented two spaces per depth level and drop anchors and detail fields.
    pub fn format_items(&self, items: &[Item], depth: usize, nested: bool) -> String {
        let indent = if nested { depth } else { 0 };
        let mut containers = String::new();
        let mut tasks = String::new();
        for item in items {
            match item {
                Item::Container(record) => {
                    containers.push_str(&"  ".repeat(indent));
                    containers.push_str(&format!("- {}", self.container_link(record)));
                    if !record.deep_link.is_empty() {
                        containers.push_str(&format!(" {}", anchor(&record.deep_link)));
                    }
                    containers.push('\n');
                }
                Item::Task(task) => self.push_task(&mut tasks, task, indent, nested),
            }
        }

        if depth != 0 || nested {
            return containers + &tasks;
        }

        let mut sections = Vec::new();
        if !containers.is_empty() {
            sections.push(format!("{}\n\n{}", CONTAINERS_HEADING, containers));
        }
        if !tasks.is_empty() {
            sections.push(format!("{}\n\n{}", TASKS_HEADING, tasks));
        }
        sections.join("\n")
    }

    fn push_task(&self, out: &mut String, task: &TaskRecord, indent: usize, nested: bool) {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&format!("- [{}] ", if task.done { 'x' } else { ' ' }));
        if !nested {
            if !task.deep_link.is_empty() {
                out.push_str(&anchor(&task.deep_link));
                out.push(' ');
            }
            out.push_str(&self.details(task));
        }
        out.push_str(&single_line(&task.title));
        out.push('\n');

        for subtask in &task.subtasks {
            self.push_task(out, subtask, indent + 1, true);
        }
    }

    fn details(&self, task: &TaskRecord) -> String {
        let mut details = String::new();
        let fields = [
            (self.options.show_due_date, "Due Date", &task.due_date),
            (self.options.show_start_date, "Start Date", &task.start_date),
            (self.options.show_scheduled_date, "Scheduled Date", &task.day),
        ];
        for (enabled, label, value) in fields {
            if let (true, Some(date)) = (enabled, value) {
                details.push_str(&format!("{}:: [[{}]] ", label, date));
            }
        }
        details
    }

    fn container_link(&self, record: &CategoryRecord) -> String {
        let path = self.index.resolve_path(self.base_dir, record);
        format!("[[{}|{}]]", path, single_line(&record.title))
    }
}

/// Note paragraph followed by the `Field:: value` lines present on the record.
fn metadata(record: &CategoryRecord) -> String {
    let mut out = String::new();
    if let Some(note) = &record.note {
        out.push_str(&format!("**Note:** {}\n\n", single_line(note)));
    }
    let mut fields = String::new();
    if let Some(date) = &record.start_date {
        fields.push_str(&format!("**Start Date::** {}\n", date));
    }
    if let Some(date) = &record.end_date {
        fields.push_str(&format!("**End Date::** {}\n", date));
    }
    if record.is_recurring {
        fields.push_str("**Recurring::** Yes\n");
    }
    if let Some(priority) = &record.priority {
        fields.push_str(&format!("**Priority::** {}\n", priority));
    }
    if !fields.is_empty() {
        out.push_str(&fields);
        out.push('\n');
    }
    out
}

fn anchor(link: &str) -> String {
    format!("[{}]({})", ANCHOR, link)
}

fn single_line(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join(" ")
}

/// `---` block listing the record's fields. Nulls are left out.
pub fn front_matter(fields: &RawRecord) -> String {
    let mut body = String::new();
    for (key, value) in fields {
        push_field(&mut body, key, value, 0);
    }
    if body.is_empty() {
        return String::new();
    }
    format!("---\n{}---\n", body)
}

fn push_field(out: &mut String, key: &str, value: &Value, level: usize) {
    let pad = "  ".repeat(level);
    match value {
        Value::Null => {}
        Value::Array(items) if items.is_empty() => out.push_str(&format!("{}{}: []\n", pad, key)),
        Value::Object(map) if map.values().all(Value::is_null) => {
            out.push_str(&format!("{}{}: {{}}\n", pad, key))
        }
        Value::Array(items) => {
            out.push_str(&format!("{}{}:\n", pad, key));
            for item in items {
                push_element(out, item, level + 1);
            }
        }
        Value::Object(map) => {
            out.push_str(&format!("{}{}:\n", pad, key));
            for (k, v) in map {
                push_field(out, k, v, level + 1);
            }
        }
        scalar => out.push_str(&format!("{}{}: {}\n", pad, key, scalar_text(scalar))),
    }
}

fn push_element(out: &mut String, value: &Value, level: usize) {
    let pad = "  ".repeat(level);
    match value {
        Value::Array(items) if !items.is_empty() => {
            out.push_str(&format!("{}-\n", pad));
            for item in items {
                push_element(out, item, level + 1);
            }
        }
        Value::Object(map) if !map.values().all(Value::is_null) => {
            out.push_str(&format!("{}-\n", pad));
            for (k, v) in map {
                push_field(out, k, v, level + 1);
            }
        }
        Value::Array(_) => out.push_str(&format!("{}- []\n", pad)),
        Value::Object(_) => out.push_str(&format!("{}- {{}}\n", pad)),
        scalar => out.push_str(&format!("{}- {}\n", pad, scalar_text(scalar))),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");
    format!("\"{}\"", escaped)
}
