//! Subject CRUD.

use axum::{
    Form,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tasknest_core::types::{RecordId, SubjectInput};
use tasknest_core::validation::{self, ValidationError, limits};
use tasknest_core::StoreError;

use super::{AppError, AppResult};
use crate::auth::{CurrentUser, User};
use crate::server::AppState;
use crate::views;

/// Subject form fields.
#[derive(Debug, Deserialize)]
pub struct SubjectForm {
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

impl SubjectForm {
    fn to_input(&self) -> Result<SubjectInput, ValidationError> {
        Ok(SubjectInput {
            name: validation::required_text("Name", &self.name, limits::MAX_SUBJECT_NAME)?,
            description: validation::optional_text(
                "Description",
                Some(&self.description),
                limits::MAX_NOTE,
            )?,
        })
    }
}

/// `GET /subjects`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let subjects = state.tasks.list_subjects(user.id)?;
    let counts = state.tasks.task_counts(user.id)?;
    Ok(views::subjects(&user, &subjects, &counts, None))
}

/// `GET /subjects/create`
pub async fn create_page(CurrentUser(user): CurrentUser) -> Html<String> {
    views::subject_form(&user, None, "", "", None)
}

/// `POST /subjects/create`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<SubjectForm>,
) -> AppResult<Response> {
    let result = form
        .to_input()
        .map_err(AppError::from)
        .and_then(|input| Ok(state.tasks.create_subject(user.id, input)?));
    respond(result.map(|_| ()), &user, None, &form)
}

/// `GET /subjects/{id}/edit`
pub async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Html<String>> {
    let subject = state
        .tasks
        .get_subject(user.id, id)?
        .ok_or(AppError::NotFound("Subject"))?;
    Ok(views::subject_form(
        &user,
        Some(id),
        &subject.name,
        subject.description.as_deref().unwrap_or(""),
        None,
    ))
}

/// `POST /subjects/{id}/edit`
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
    Form(form): Form<SubjectForm>,
) -> AppResult<Response> {
    let result = form
        .to_input()
        .map_err(AppError::from)
        .and_then(|input| Ok(state.tasks.update_subject(user.id, id, input)?));
    respond(result.map(|_| ()), &user, Some(id), &form)
}

/// `POST /subjects/{id}/delete`
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Redirect> {
    if !state.tasks.delete_subject(user.id, id)? {
        return Err(AppError::NotFound("Subject"));
    }
    Ok(Redirect::to("/subjects"))
}

// Validation and name clashes re-render the form; anything else propagates.
fn respond(
    result: AppResult<()>,
    user: &User,
    existing: Option<RecordId>,
    form: &SubjectForm,
) -> AppResult<Response> {
    let error = match result {
        Ok(()) => return Ok(Redirect::to("/subjects").into_response()),
        Err(AppError::Validation(e)) => e.to_string(),
        Err(AppError::Store(StoreError::Conflict(message))) => message,
        Err(e) => return Err(e),
    };
    Ok(views::subject_form(user, existing, &form.name, &form.description, Some(&error)).into_response())
}
