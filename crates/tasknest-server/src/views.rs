//! Server-rendered HTML pages.
//!
//! Deliberately plain: one layout, a few forms and tables. Every piece of
//! user data goes through [`escape`].

use std::collections::HashMap;

use axum::response::Html;
use chrono::NaiveDateTime;
use tasknest_core::types::{
    DUE_DATE_FORMAT, Dashboard, Label, Notifications, RecordId, Subject, Task, TaskFilter,
    TaskStatus,
};

use crate::auth::User;

/// Escape text for HTML element and attribute content.
#[must_use]
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, user: Option<&User>, body: &str) -> Html<String> {
    let nav = match user {
        Some(user) => format!(
            r#"<nav>
  <a class="brand" href="/dashboard">Tasknest</a>
  <a href="/dashboard">Dashboard</a>
  <a href="/tasks">Tasks</a>
  <a href="/subjects">Subjects</a>
  <a href="/labels">Labels</a>
  <a href="/notifications">Notifications</a>
  <a href="/profile">{}</a>
  <a href="/logout">Log out</a>
</nav>"#,
            escape(user.display_name())
        ),
        None => r#"<nav>
  <a class="brand" href="/">Tasknest</a>
  <a href="/login">Log in</a>
  <a href="/register">Register</a>
</nav>"#
            .to_string(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} · Tasknest</title>
<link rel="stylesheet" href="/static/css/app.css">
<script src="/static/js/app.js" defer></script>
</head>
<body>
{nav}
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
    ))
}

fn alert(kind: &str, text: Option<&str>) -> String {
    text.map(|t| format!(r#"<div class="alert {kind}">{}</div>"#, escape(t)))
        .unwrap_or_default()
}

fn format_due(due: Option<NaiveDateTime>) -> String {
    due.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn subject_names(subjects: &[Subject]) -> HashMap<RecordId, &str> {
    subjects.iter().map(|s| (s.id, s.name.as_str())).collect()
}

fn task_rows(tasks: &[Task], subjects: &[Subject], now: NaiveDateTime, actions: bool) -> String {
    if tasks.is_empty() {
        return r#"<p class="muted">No tasks.</p>"#.to_string();
    }

    let names = subject_names(subjects);
    let mut rows = String::new();
    for task in tasks {
        let class = if task.status == TaskStatus::Done {
            "status-done"
        } else if task.is_overdue(now) {
            "overdue"
        } else {
            ""
        };
        let subject = names.get(&task.subject_id).copied().unwrap_or("-");
        let controls = if actions {
            format!(
                r#"<td>
  <form class="inline" method="post" action="/tasks/{id}/toggle"><button class="link" type="submit">{toggle}</button></form>
  <a href="/tasks/{id}/edit">Edit</a>
  <form class="inline" method="post" action="/tasks/{id}/delete" data-confirm="Delete this task?"><button class="link" type="submit">Delete</button></form>
</td>"#,
                id = task.id,
                toggle = if task.status == TaskStatus::Done { "Reopen" } else { "Done" },
            )
        } else {
            String::new()
        };
        rows.push_str(&format!(
            r#"<tr><td class="{class}">{title}</td><td>{subject}</td><td>{status}</td><td>{due}</td>{controls}</tr>
"#,
            title = escape(&task.title),
            subject = escape(subject),
            status = task.status,
            due = format_due(task.due_date),
        ));
    }

    let extra = if actions { "<th></th>" } else { "" };
    format!(
        r"<table>
<tr><th>Title</th><th>Subject</th><th>Status</th><th>Due</th>{extra}</tr>
{rows}</table>"
    )
}

// ---- auth ----

/// Login form. `message` is shown as an info banner.
#[must_use]
pub fn login(error: Option<&str>, message: Option<&str>) -> Html<String> {
    let body = format!(
        r#"<div class="card">
<h1>Log in</h1>
{message}{error}
<form method="post" action="/login">
  <label for="username">Username</label>
  <input id="username" name="username" required autofocus>
  <label for="password">Password</label>
  <input id="password" name="password" type="password" required>
  <p><button type="submit">Log in</button></p>
</form>
<p>No account yet? <a href="/register">Register</a></p>
</div>"#,
        message = alert("info", message),
        error = alert("error", error),
    );
    layout("Log in", None, &body)
}

/// Registration form, refilled after a rejected submission.
#[must_use]
pub fn register(error: Option<&str>, username: &str, email: &str, full_name: &str) -> Html<String> {
    let body = format!(
        r#"<div class="card">
<h1>Register</h1>
{error}
<form method="post" action="/register">
  <label for="username">Username</label>
  <input id="username" name="username" value="{username}" required minlength="3" maxlength="50">
  <label for="email">Email</label>
  <input id="email" name="email" type="email" value="{email}" required maxlength="100">
  <label for="full_name">Full name</label>
  <input id="full_name" name="full_name" value="{full_name}" maxlength="100">
  <label for="password">Password</label>
  <input id="password" name="password" type="password" required minlength="6">
  <p><button type="submit">Create account</button></p>
</form>
<p>Already registered? <a href="/login">Log in</a></p>
</div>"#,
        error = alert("error", error),
        username = escape(username),
        email = escape(email),
        full_name = escape(full_name),
    );
    layout("Register", None, &body)
}

/// Counts shown on the profile page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileCounts {
    /// Subjects owned.
    pub subjects: usize,
    /// Labels owned.
    pub labels: usize,
    /// Tasks owned.
    pub tasks: usize,
    /// Tasks still open.
    pub open_tasks: usize,
}

/// Profile page.
#[must_use]
pub fn profile(user: &User, counts: ProfileCounts) -> Html<String> {
    let body = format!(
        r#"<div class="card">
<h1>{name}</h1>
<table>
<tr><th>Username</th><td>{username}</td></tr>
<tr><th>Email</th><td>{email}</td></tr>
<tr><th>Member since</th><td>{since}</td></tr>
<tr><th>Subjects</th><td>{subjects}</td></tr>
<tr><th>Labels</th><td>{labels}</td></tr>
<tr><th>Tasks</th><td>{tasks} ({open} open)</td></tr>
</table>
</div>"#,
        name = escape(user.display_name()),
        username = escape(&user.username),
        email = escape(&user.email),
        since = user.created_at.format("%Y-%m-%d"),
        subjects = counts.subjects,
        labels = counts.labels,
        tasks = counts.tasks,
        open = counts.open_tasks,
    );
    layout("Profile", Some(user), &body)
}

// ---- overview ----

/// Dashboard with counts and the latest tasks.
#[must_use]
pub fn dashboard(
    user: &User,
    dashboard: &Dashboard,
    subjects: &[Subject],
    now: NaiveDateTime,
) -> Html<String> {
    let s = dashboard.stats;
    let stat = |value: usize, label: &str| {
        format!(
            r#"<div class="card stat"><div class="value">{value}</div><div class="label">{label}</div></div>"#
        )
    };
    let body = format!(
        r#"<h1>Hello, {name}</h1>
<div class="stats">
{total}{todo}{done}{today}{overdue}
</div>
<div class="card">
<h2>Recent tasks</h2>
{recent}
<p><a class="button" href="/tasks/create">New task</a></p>
</div>"#,
        name = escape(user.display_name()),
        total = stat(s.total_tasks, "Total"),
        todo = stat(s.todo_tasks, "To do"),
        done = stat(s.done_tasks, "Done"),
        today = stat(s.due_today_count, "Due today"),
        overdue = stat(s.overdue_count, "Overdue"),
        recent = task_rows(&dashboard.recent_tasks, subjects, now, false),
    );
    layout("Dashboard", Some(user), &body)
}

/// Notification buckets.
#[must_use]
pub fn notifications(
    user: &User,
    notes: &Notifications,
    subjects: &[Subject],
    now: NaiveDateTime,
) -> Html<String> {
    let section = |title: &str, tasks: &[Task]| {
        format!(
            r#"<div class="card"><h2>{title} ({count})</h2>{rows}</div>"#,
            count = tasks.len(),
            rows = task_rows(tasks, subjects, now, true),
        )
    };
    let body = format!(
        "<h1>Notifications</h1>\n{}{}{}",
        section("Due today", &notes.due_today),
        section("Overdue for 3+ days", &notes.overdue),
        section("Recently overdue", &notes.recent_overdue),
    );
    layout("Notifications", Some(user), &body)
}

// ---- subjects ----

/// Subject list with task counts.
#[must_use]
pub fn subjects(
    user: &User,
    subjects: &[Subject],
    counts: &HashMap<RecordId, usize>,
    message: Option<&str>,
) -> Html<String> {
    let mut rows = String::new();
    for subject in subjects {
        rows.push_str(&format!(
            r#"<tr><td><a href="/tasks?subject_id={id}">{name}</a></td><td>{description}</td><td>{count}</td>
<td><a href="/subjects/{id}/edit">Edit</a>
<form class="inline" method="post" action="/subjects/{id}/delete" data-confirm="Delete this subject and all of its tasks?"><button class="link" type="submit">Delete</button></form></td></tr>
"#,
            id = subject.id,
            name = escape(&subject.name),
            description = escape(subject.description.as_deref().unwrap_or("")),
            count = counts.get(&subject.id).copied().unwrap_or(0),
        ));
    }

    let body = format!(
        r#"<h1>Subjects</h1>
{message}
<p><a class="button" href="/subjects/create">New subject</a></p>
<div class="card"><table>
<tr><th>Name</th><th>Description</th><th>Tasks</th><th></th></tr>
{rows}</table></div>"#,
        message = alert("info", message),
    );
    layout("Subjects", Some(user), &body)
}

/// Create or edit form for a subject.
#[must_use]
pub fn subject_form(
    user: &User,
    existing: Option<RecordId>,
    name: &str,
    description: &str,
    error: Option<&str>,
) -> Html<String> {
    let (title, action) = match existing {
        Some(id) => ("Edit subject", format!("/subjects/{id}/edit")),
        None => ("New subject", "/subjects/create".to_string()),
    };
    let body = format!(
        r#"<div class="card">
<h1>{title}</h1>
{error}
<form method="post" action="{action}">
  <label for="name">Name</label>
  <input id="name" name="name" value="{name}" required maxlength="100">
  <label for="description">Description</label>
  <textarea id="description" name="description" rows="3">{description}</textarea>
  <p><button type="submit">Save</button> <a href="/subjects">Cancel</a></p>
</form>
</div>"#,
        error = alert("error", error),
        name = escape(name),
        description = escape(description),
    );
    layout(title, Some(user), &body)
}

// ---- labels ----

/// Label list.
#[must_use]
pub fn labels(user: &User, labels: &[Label], message: Option<&str>) -> Html<String> {
    let mut rows = String::new();
    for label in labels {
        rows.push_str(&format!(
            r#"<tr><td><span class="badge" style="background:{color}">{name}</span></td><td>{color}</td>
<td><a href="/tasks?label_id={id}">Tasks</a> <a href="/labels/{id}/edit">Edit</a>
<form class="inline" method="post" action="/labels/{id}/delete" data-confirm="Delete this label?"><button class="link" type="submit">Delete</button></form></td></tr>
"#,
            id = label.id,
            name = escape(&label.name),
            color = escape(&label.color),
        ));
    }

    let body = format!(
        r#"<h1>Labels</h1>
{message}
<p><a class="button" href="/labels/create">New label</a></p>
<div class="card"><table>
<tr><th>Name</th><th>Color</th><th></th></tr>
{rows}</table></div>"#,
        message = alert("info", message),
    );
    layout("Labels", Some(user), &body)
}

/// Create or edit form for a label.
#[must_use]
pub fn label_form(
    user: &User,
    existing: Option<RecordId>,
    name: &str,
    color: &str,
    error: Option<&str>,
) -> Html<String> {
    let (title, action) = match existing {
        Some(id) => ("Edit label", format!("/labels/{id}/edit")),
        None => ("New label", "/labels/create".to_string()),
    };
    let body = format!(
        r#"<div class="card">
<h1>{title}</h1>
{error}
<form method="post" action="{action}">
  <label for="name">Name</label>
  <input id="name" name="name" value="{name}" required maxlength="50">
  <label for="color">Color</label>
  <input id="color" name="color" type="color" value="{color}">
  <p><button type="submit">Save</button> <a href="/labels">Cancel</a></p>
</form>
</div>"#,
        error = alert("error", error),
        name = escape(name),
        color = escape(color),
    );
    layout(title, Some(user), &body)
}

// ---- tasks ----

/// Values shown in the task form.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    /// Title.
    pub title: String,
    /// Note.
    pub note: String,
    /// Selected subject.
    pub subject_id: Option<RecordId>,
    /// Selected label.
    pub label_id: Option<RecordId>,
    /// Due time.
    pub due_date: Option<NaiveDateTime>,
    /// Status.
    pub status: TaskStatus,
}

impl From<&Task> for TaskDraft {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            note: task.note.clone().unwrap_or_default(),
            subject_id: Some(task.subject_id),
            label_id: task.label_id,
            due_date: task.due_date,
            status: task.status,
        }
    }
}

fn options<'a>(
    items: impl Iterator<Item = (RecordId, &'a str)>,
    selected: Option<RecordId>,
) -> String {
    items
        .map(|(id, name)| {
            let sel = if selected == Some(id) { " selected" } else { "" };
            format!(r#"<option value="{id}"{sel}>{}</option>"#, escape(name))
        })
        .collect()
}

/// Filtered task list.
#[must_use]
pub fn tasks(
    user: &User,
    tasks: &[Task],
    subjects: &[Subject],
    labels: &[Label],
    filter: &TaskFilter,
    now: NaiveDateTime,
) -> Html<String> {
    let status_options: String = [TaskStatus::Todo, TaskStatus::Done]
        .iter()
        .map(|s| {
            let sel = if filter.status == Some(*s) { " selected" } else { "" };
            format!(r#"<option value="{s}"{sel}>{s}</option>"#)
        })
        .collect();
    let checked = |on: bool| if on { " checked" } else { "" };

    let body = format!(
        r#"<h1>Tasks</h1>
<p><a class="button" href="/tasks/create">New task</a></p>
<form class="card" method="get" action="/tasks">
<div class="filters">
  <div><label for="search">Search</label><input id="search" name="search" value="{search}"></div>
  <div><label for="subject_id">Subject</label><select id="subject_id" name="subject_id"><option value="">All</option>{subjects}</select></div>
  <div><label for="label_id">Label</label><select id="label_id" name="label_id"><option value="">All</option>{labels}</select></div>
  <div><label for="status">Status</label><select id="status" name="status"><option value="">All</option>{statuses}</select></div>
  <div><label><input type="checkbox" name="due_today" value="true"{due_today}> Due today</label></div>
  <div><label><input type="checkbox" name="overdue" value="true"{overdue}> Overdue</label></div>
</div>
<p><button type="submit">Filter</button> <a href="/tasks">Reset</a></p>
</form>
<div class="card">{rows}</div>"#,
        search = escape(filter.search.as_deref().unwrap_or("")),
        subjects = options(subjects.iter().map(|s| (s.id, s.name.as_str())), filter.subject_id),
        labels = options(labels.iter().map(|l| (l.id, l.name.as_str())), filter.label_id),
        statuses = status_options,
        due_today = checked(filter.due_today),
        overdue = checked(filter.overdue),
        rows = task_rows(tasks, subjects, now, true),
    );
    layout("Tasks", Some(user), &body)
}

/// Create or edit form for a task.
#[must_use]
pub fn task_form(
    user: &User,
    existing: Option<RecordId>,
    draft: &TaskDraft,
    subjects: &[Subject],
    labels: &[Label],
    error: Option<&str>,
) -> Html<String> {
    let (title, action) = match existing {
        Some(id) => ("Edit task", format!("/tasks/{id}/edit")),
        None => ("New task", "/tasks/create".to_string()),
    };
    let hint = if subjects.is_empty() {
        r#"<div class="alert info">Create a <a href="/subjects/create">subject</a> first.</div>"#
    } else {
        ""
    };
    let status_field = if existing.is_some() {
        let done = if draft.status == TaskStatus::Done { " selected" } else { "" };
        format!(
            r#"<label for="status">Status</label>
  <select id="status" name="status"><option value="todo">todo</option><option value="done"{done}>done</option></select>"#
        )
    } else {
        String::new()
    };

    let body = format!(
        r#"<div class="card">
<h1>{title}</h1>
{error}{hint}
<form method="post" action="{action}">
  <label for="title">Title</label>
  <input id="title" name="title" value="{task_title}" required maxlength="200">
  <label for="note">Note</label>
  <textarea id="note" name="note" rows="4">{note}</textarea>
  <label for="subject_id">Subject</label>
  <select id="subject_id" name="subject_id" required>{subjects}</select>
  <label for="label_id">Label</label>
  <select id="label_id" name="label_id"><option value="">None</option>{labels}</select>
  <label for="due_date">Due</label>
  <input id="due_date" name="due_date" type="datetime-local" value="{due}">
  {status_field}
  <p><button type="submit">Save</button> <a href="/tasks">Cancel</a></p>
</form>
</div>"#,
        error = alert("error", error),
        task_title = escape(&draft.title),
        note = escape(&draft.note),
        subjects = options(subjects.iter().map(|s| (s.id, s.name.as_str())), draft.subject_id),
        labels = options(labels.iter().map(|l| (l.id, l.name.as_str())), draft.label_id),
        due = draft
            .due_date
            .map(|d| d.format(DUE_DATE_FORMAT).to_string())
            .unwrap_or_default(),
    );
    layout(title, Some(user), &body)
}

// ---- errors ----

/// 404 page body.
#[must_use]
pub fn not_found() -> Html<String> {
    layout(
        "Not found",
        None,
        r#"<div class="card"><h1>Page not found</h1><p><a href="/dashboard">Back to the dashboard</a></p></div>"#,
    )
}

/// Generic error page body.
#[must_use]
pub fn error(message: &str) -> Html<String> {
    let body = format!(
        r#"<div class="card"><h1>Something went wrong</h1><p>{}</p><p><a href="/dashboard">Back to the dashboard</a></p></div>"#,
        escape(message)
    );
    layout("Error", None, &body)
}
