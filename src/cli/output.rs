use serde::Serialize;

use crate::model::record::CategoryRecord;
use crate::ops::hierarchy::CategoryIndex;
use crate::ops::mirror::SyncReport;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CategoryJson {
    /// Absent for the inbox entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    /// Picker label, e.g. "Groceries in Home/Errands"
    pub display: String,
    /// Slash-delimited title path, e.g. "/Home/Errands/Groceries"
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Serialize)]
pub struct SyncFailureJson {
    pub target: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct SyncReportJson {
    pub written: Vec<String>,
    pub skipped: Vec<SyncFailureJson>,
    pub inbox_written: bool,
}

#[derive(Serialize)]
pub struct CompletionJson {
    pub item_id: String,
    pub line: usize,
    pub marking_done: bool,
}

/// Generated markdown, printed or inserted into a file
#[derive(Serialize)]
pub struct BlockJson {
    pub markdown: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_into: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

/// Picker entries: the inbox first, then categories by full title path.
pub fn picker_to_json(index: &CategoryIndex) -> Vec<CategoryJson> {
    let mut entries = vec![CategoryJson {
        id: None,
        title: "Inbox".to_string(),
        display: "Inbox".to_string(),
        path: "/Inbox".to_string(),
        kind: "inbox".to_string(),
    }];
    entries.extend(
        index
            .picker_order()
            .into_iter()
            .map(|record| category_to_json(index, record)),
    );
    entries
}

fn category_to_json(index: &CategoryIndex, record: &CategoryRecord) -> CategoryJson {
    CategoryJson {
        id: Some(record.id.clone()),
        title: record.title.clone(),
        display: index.display_title(record),
        path: index.full_title_path(record),
        kind: record.kind.as_str().to_string(),
    }
}

pub fn sync_report_to_json(report: &SyncReport) -> SyncReportJson {
    SyncReportJson {
        written: report.written.clone(),
        skipped: report
            .skipped
            .iter()
            .map(|f| SyncFailureJson {
                target: f.target.clone(),
                reason: f.reason.clone(),
            })
            .collect(),
        inbox_written: report.inbox_written,
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One picker line per entry: `id<TAB>display`, the inbox as `inbox`.
pub fn format_picker_line(entry: &CategoryJson) -> String {
    format!("{}\t{}", entry.id.as_deref().unwrap_or("inbox"), entry.display)
}

pub fn format_sync_report(report: &SyncReport) -> String {
    let mut out = report.summary();
    for failure in &report.skipped {
        out.push_str(&format!("\n  skipped {}: {}", failure.target, failure.reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::RawRecord;
    use crate::ops::mirror::SyncFailure;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: serde_json::Value) -> CategoryRecord {
        let raw: RawRecord = serde_json::from_value(value).unwrap();
        CategoryRecord::from_raw(raw).unwrap()
    }

    #[test]
    fn test_picker_lists_inbox_first_then_by_path() {
        let records = vec![
            record(json!({"_id": "z", "title": "Zoo", "type": "category", "parentId": "root"})),
            record(json!({"_id": "h", "title": "Home", "type": "category", "parentId": "root"})),
            record(json!({"_id": "g", "title": "Groceries", "type": "project", "parentId": "h"})),
        ];
        let index = CategoryIndex::build(&records);
        let lines: Vec<String> = picker_to_json(&index).iter().map(format_picker_line).collect();
        assert_eq!(
            lines,
            vec!["inbox\tInbox", "h\tHome", "g\tGroceries in Home", "z\tZoo"]
        );
    }

    #[test]
    fn test_sync_report_text() {
        let report = SyncReport {
            written: vec!["AM/Home.md".to_string()],
            skipped: vec![SyncFailure {
                target: "AM/Work.md".to_string(),
                reason: "500".to_string(),
            }],
            inbox_written: true,
        };
        assert_eq!(
            format_sync_report(&report),
            "1 documents written, 1 skipped, inbox written\n  skipped AM/Work.md: 500"
        );
        let json = serde_json::to_value(sync_report_to_json(&report)).unwrap();
        assert_eq!(json["skipped"][0]["target"], "AM/Work.md");
    }
}
