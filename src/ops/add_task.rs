use crate::io::remote::{RemoteError, TaskService};
use crate::model::record::{Item, TaskRecord};
use crate::ops::format::Formatter;
use crate::ops::hierarchy::CategoryIndex;

/// Error type for the add-task flow
#[derive(Debug, thiserror::Error)]
pub enum AddTaskError {
    #[error("task text is empty")]
    MissingText,
    #[error("no category selected")]
    MissingCategory,
    #[error("no category matches '{0}'")]
    UnknownCategory(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Where a new task goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryChoice {
    Inbox,
    Category(String),
}

/// A task ready to send to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub parent_id: Option<String>,
    pub note: Option<String>,
}

/// Resolve a picker selection: `inbox`, a category id, or a category title.
pub fn resolve_choice(selector: &str, index: &CategoryIndex) -> Result<CategoryChoice, AddTaskError> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(AddTaskError::MissingCategory);
    }
    if selector.eq_ignore_ascii_case("inbox") {
        return Ok(CategoryChoice::Inbox);
    }
    index
        .find(selector)
        .map(|record| CategoryChoice::Category(record.id.clone()))
        .ok_or_else(|| AddTaskError::UnknownCategory(selector.to_string()))
}

/// Validate the dialog input. The first non-empty line is the title, the
/// rest becomes the note.
pub fn build_new_task(text: &str, choice: Option<&CategoryChoice>) -> Result<NewTask, AddTaskError> {
    let mut lines = text.lines().skip_while(|l| l.trim().is_empty());
    let title = lines.next().map(str::trim).unwrap_or_default().to_string();
    if title.is_empty() {
        return Err(AddTaskError::MissingText);
    }
    let choice = choice.ok_or(AddTaskError::MissingCategory)?;

    let note = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Ok(NewTask {
        title,
        parent_id: match choice {
            CategoryChoice::Inbox => None,
            CategoryChoice::Category(id) => Some(id.clone()),
        },
        note: (!note.is_empty()).then_some(note),
    })
}

/// Create the task remotely and render the line to insert at the cursor.
pub fn add_task<S: TaskService>(
    service: &S,
    formatter: &Formatter,
    task: &NewTask,
) -> Result<String, AddTaskError> {
    let created = service.add_task(task)?;
    let item = Item::Task(TaskRecord::from_raw(&created));
    Ok(formatter.format_items(&[item], 1, false))
}
