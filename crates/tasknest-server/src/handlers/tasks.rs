//! Task CRUD and the filtered task list.

use axum::{
    Form,
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tasknest_core::StoreError;
use tasknest_core::types::{
    RecordId, TaskFilter, TaskInput, TaskStatus, parse_due_date, parse_optional_id,
};
use tasknest_core::validation::{self, ValidationError, limits};

use super::{AppError, AppResult, now};
use crate::auth::{CurrentUser, User};
use crate::server::AppState;
use crate::views::{self, TaskDraft};

/// Query string of `GET /tasks`.
///
/// Everything arrives as text; unparseable values are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    subject_id: Option<String>,
    status: Option<String>,
    label_id: Option<String>,
    due_today: Option<String>,
    overdue: Option<String>,
    search: Option<String>,
}

fn flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("true" | "1" | "on" | "yes"))
}

impl TaskQuery {
    /// Build the store filter.
    #[must_use]
    pub fn to_filter(&self) -> TaskFilter {
        TaskFilter {
            subject_id: parse_optional_id(self.subject_id.as_deref()),
            status: self.status.as_deref().and_then(|s| s.parse().ok()),
            label_id: parse_optional_id(self.label_id.as_deref()),
            due_today: flag(self.due_today.as_deref()),
            overdue: flag(self.overdue.as_deref()),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

/// Task form fields.
#[derive(Debug, Default, Deserialize)]
pub struct TaskForm {
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Note.
    #[serde(default)]
    pub note: String,
    /// Subject id.
    #[serde(default)]
    pub subject_id: String,
    /// Label id, blank for none.
    #[serde(default)]
    pub label_id: String,
    /// `YYYY-MM-DDTHH:MM`, blank for none.
    #[serde(default)]
    pub due_date: String,
    /// `todo` or `done`; only on the edit form.
    #[serde(default)]
    pub status: String,
}

impl TaskForm {
    fn to_input(&self) -> Result<TaskInput, ValidationError> {
        let title = validation::required_text("Title", &self.title, limits::MAX_TITLE)?;
        let note = validation::optional_text("Note", Some(&self.note), limits::MAX_NOTE)?;
        let subject_id = parse_optional_id(Some(&self.subject_id))
            .ok_or(ValidationError::Empty { field: "Subject" })?;

        Ok(TaskInput {
            title,
            note,
            subject_id,
            label_id: parse_optional_id(Some(&self.label_id)),
            due_date: parse_due_date(&self.due_date),
            status: self.status.parse().ok(),
        })
    }

    fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            note: self.note.clone(),
            subject_id: parse_optional_id(Some(&self.subject_id)),
            label_id: parse_optional_id(Some(&self.label_id)),
            due_date: parse_due_date(&self.due_date),
            status: self.status.parse().unwrap_or(TaskStatus::Todo),
        }
    }
}

/// `GET /tasks`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<TaskQuery>,
) -> AppResult<Html<String>> {
    let now = now();
    let filter = query.to_filter();
    let tasks = state.tasks.list_tasks(user.id, &filter, now)?;
    let subjects = state.tasks.list_subjects(user.id)?;
    let labels = state.tasks.list_labels(user.id)?;
    Ok(views::tasks(&user, &tasks, &subjects, &labels, &filter, now))
}

/// `GET /tasks/create`
pub async fn create_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    form_page(&state, &user, None, &TaskDraft::default(), None)
}

/// `POST /tasks/create`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<TaskForm>,
) -> AppResult<Response> {
    let result = form
        .to_input()
        .map_err(AppError::from)
        .and_then(|input| Ok(state.tasks.create_task(user.id, input)?));
    respond(&state, result.map(|_| ()), &user, None, &form)
}

/// `GET /tasks/{id}/edit`
pub async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Html<String>> {
    let task = state
        .tasks
        .get_task(user.id, id)?
        .ok_or(AppError::NotFound("Task"))?;
    form_page(&state, &user, Some(id), &TaskDraft::from(&task), None)
}

/// `POST /tasks/{id}/edit`
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
    Form(form): Form<TaskForm>,
) -> AppResult<Response> {
    let result = form
        .to_input()
        .map_err(AppError::from)
        .and_then(|input| Ok(state.tasks.update_task(user.id, id, input)?));
    respond(&state, result.map(|_| ()), &user, Some(id), &form)
}

/// `POST /tasks/{id}/toggle`
pub async fn toggle(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Redirect> {
    let task = state.tasks.toggle_task(user.id, id)?;
    tracing::debug!(task_id = task.id, status = %task.status, "Toggled task");
    Ok(Redirect::to("/tasks"))
}

/// `POST /tasks/{id}/delete`
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Redirect> {
    if !state.tasks.delete_task(user.id, id)? {
        return Err(AppError::NotFound("Task"));
    }
    Ok(Redirect::to("/tasks"))
}

fn form_page(
    state: &AppState,
    user: &User,
    existing: Option<RecordId>,
    draft: &TaskDraft,
    error: Option<&str>,
) -> AppResult<Html<String>> {
    let subjects = state.tasks.list_subjects(user.id)?;
    let labels = state.tasks.list_labels(user.id)?;
    Ok(views::task_form(user, existing, draft, &subjects, &labels, error))
}

fn respond(
    state: &AppState,
    result: AppResult<()>,
    user: &User,
    existing: Option<RecordId>,
    form: &TaskForm,
) -> AppResult<Response> {
    let error = match result {
        Ok(()) => return Ok(Redirect::to("/tasks").into_response()),
        Err(AppError::Validation(e)) => e.to_string(),
        Err(AppError::Store(StoreError::Conflict(message))) => message,
        Err(e) => return Err(e),
    };
    Ok(form_page(state, user, existing, &form.to_draft(), Some(&error))?.into_response())
}
