//! Domain types: subjects, labels, tasks and the queries over them.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage-assigned record identifier.
pub type RecordId = u64;

/// Default label colour.
pub const DEFAULT_LABEL_COLOR: &str = "#FF6B6B";

/// Overdue tasks older than this many days are escalated in notifications.
pub const OVERDUE_ESCALATION_DAYS: i64 = 3;

/// Number of tasks shown in the dashboard's recent list.
pub const RECENT_TASK_LIMIT: usize = 5;

/// Format used by `datetime-local` inputs.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Parse a form due date.
///
/// Accepts `YYYY-MM-DDTHH:MM` or a bare `YYYY-MM-DD` (midnight). Anything
/// else, including an empty string, yields `None`.
#[must_use]
pub fn parse_due_date(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(input, DUE_DATE_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse an optional ID from a form or query field. Blank or non-numeric input yields `None`.
#[must_use]
pub fn parse_optional_id(input: Option<&str>) -> Option<RecordId> {
    input.and_then(|s| s.trim().parse().ok())
}

/// A subject groups related tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Record ID.
    pub id: RecordId,
    /// Owning user.
    pub user_id: RecordId,
    /// Name, unique per user.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A coloured tag that can be attached to tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Record ID.
    pub id: RecordId,
    /// Owning user.
    pub user_id: RecordId,
    /// Name, unique per user.
    pub name: String,
    /// Hex colour (`#RRGGBB`).
    pub color: String,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// Task completion status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Still to be done.
    #[default]
    Todo,
    /// Completed.
    Done,
}

impl TaskStatus {
    /// Get string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Done => "done",
        }
    }

    /// The other status.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Todo => Self::Done,
            Self::Done => Self::Todo,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "done" => Ok(Self::Done),
            _ => Err(format!("Unknown task status: {s}")),
        }
    }
}

/// A unit of work owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Record ID.
    pub id: RecordId,
    /// Owning user.
    pub user_id: RecordId,
    /// Subject the task belongs to (same owner).
    pub subject_id: RecordId,
    /// Optional label (same owner).
    pub label_id: Option<RecordId>,
    /// Short title.
    pub title: String,
    /// Free-form note.
    pub note: Option<String>,
    /// Completion status.
    pub status: TaskStatus,
    /// Local wall-clock due time.
    pub due_date: Option<NaiveDateTime>,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last modified.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Whether the task is open and due on `today`.
    #[must_use]
    pub fn is_due_on(&self, today: NaiveDate) -> bool {
        self.status == TaskStatus::Todo && self.due_date.is_some_and(|due| due.date() == today)
    }

    /// Whether the task is open and its due time has passed.
    #[must_use]
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        self.status == TaskStatus::Todo && self.due_date.is_some_and(|due| due < now)
    }
}

/// Validated input for creating or renaming a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectInput {
    /// Name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

/// Validated input for creating or editing a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInput {
    /// Name.
    pub name: String,
    /// Hex colour.
    pub color: String,
}

/// Validated input for creating or editing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
    /// Title.
    pub title: String,
    /// Note.
    pub note: Option<String>,
    /// Subject (must be owned by the caller).
    pub subject_id: RecordId,
    /// Label (dropped when not owned by the caller).
    pub label_id: Option<RecordId>,
    /// Due time.
    pub due_date: Option<NaiveDateTime>,
    /// Status; `None` keeps the current one (or `Todo` on create).
    pub status: Option<TaskStatus>,
}

/// Filters for the task list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    /// Only tasks in this subject.
    #[serde(default)]
    pub subject_id: Option<RecordId>,
    /// Only tasks with this status.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Only tasks with this label.
    #[serde(default)]
    pub label_id: Option<RecordId>,
    /// Only tasks due today.
    #[serde(default)]
    pub due_today: bool,
    /// Only open tasks past their due time.
    #[serde(default)]
    pub overdue: bool,
    /// Case-insensitive substring of title or note.
    #[serde(default)]
    pub search: Option<String>,
}

impl TaskFilter {
    /// Check whether a task passes every active filter.
    #[must_use]
    pub fn matches(&self, task: &Task, now: NaiveDateTime) -> bool {
        if self.subject_id.is_some_and(|id| task.subject_id != id) {
            return false;
        }
        if self.status.is_some_and(|status| task.status != status) {
            return false;
        }
        if self.label_id.is_some() && task.label_id != self.label_id {
            return false;
        }
        if self.due_today && !task.due_date.is_some_and(|due| due.date() == now.date()) {
            return false;
        }
        if self.overdue && !task.is_overdue(now) {
            return false;
        }
        if let Some(needle) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_note = task
                .note
                .as_deref()
                .is_some_and(|note| note.to_lowercase().contains(&needle));
            if !in_title && !in_note {
                return false;
            }
        }
        true
    }

    /// Whether no filter is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Open tasks grouped by urgency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notifications {
    /// Due at some point today.
    pub due_today: Vec<Task>,
    /// Overdue by more than the escalation window.
    pub overdue: Vec<Task>,
    /// Overdue, but within the escalation window.
    pub recent_overdue: Vec<Task>,
}

impl Notifications {
    /// Sort open tasks into buckets relative to `now`. Each bucket is ordered by due time.
    #[must_use]
    pub fn collect<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: NaiveDateTime) -> Self {
        let escalation = now - Duration::days(OVERDUE_ESCALATION_DAYS);
        let mut buckets = Self::default();

        for task in tasks {
            let (TaskStatus::Todo, Some(due)) = (task.status, task.due_date) else {
                continue;
            };
            if due.date() == now.date() {
                buckets.due_today.push(task.clone());
            }
            if due < escalation {
                buckets.overdue.push(task.clone());
            } else if due < now {
                buckets.recent_overdue.push(task.clone());
            }
        }

        for bucket in [
            &mut buckets.due_today,
            &mut buckets.overdue,
            &mut buckets.recent_overdue,
        ] {
            bucket.sort_by_key(|t| t.due_date);
        }
        buckets
    }

    /// Total number of entries across buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.due_today.len() + self.overdue.len() + self.recent_overdue.len()
    }

    /// Whether every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Summary counts for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// All tasks.
    pub total_tasks: usize,
    /// Open tasks.
    pub todo_tasks: usize,
    /// Completed tasks.
    pub done_tasks: usize,
    /// Open tasks due today.
    pub due_today_count: usize,
    /// Open tasks past due.
    pub overdue_count: usize,
}

impl DashboardStats {
    /// Count tasks relative to `now`.
    #[must_use]
    pub fn collect<'a>(tasks: impl IntoIterator<Item = &'a Task>, now: NaiveDateTime) -> Self {
        let mut stats = Self::default();
        for task in tasks {
            stats.total_tasks += 1;
            match task.status {
                TaskStatus::Todo => stats.todo_tasks += 1,
                TaskStatus::Done => stats.done_tasks += 1,
            }
            if task.is_due_on(now.date()) {
                stats.due_today_count += 1;
            }
            if task.is_overdue(now) {
                stats.overdue_count += 1;
            }
        }
        stats
    }
}

/// Dashboard contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dashboard {
    /// Counts.
    pub stats: DashboardStats,
    /// Most recently created tasks.
    pub recent_tasks: Vec<Task>,
}
