//! Label CRUD.

use axum::{
    Form,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tasknest_core::StoreError;
use tasknest_core::types::{DEFAULT_LABEL_COLOR, LabelInput, RecordId};
use tasknest_core::validation::{self, ValidationError, limits};

use super::{AppError, AppResult};
use crate::auth::{CurrentUser, User};
use crate::server::AppState;
use crate::views;

/// Label form fields.
#[derive(Debug, Deserialize)]
pub struct LabelForm {
    /// Name.
    #[serde(default)]
    pub name: String,
    /// `#RRGGBB`; blank keeps the default.
    #[serde(default)]
    pub color: String,
}

impl LabelForm {
    fn to_input(&self) -> Result<LabelInput, ValidationError> {
        let color = if self.color.trim().is_empty() {
            String::new()
        } else {
            validation::validate_color(&self.color)?
        };
        Ok(LabelInput {
            name: validation::required_text("Name", &self.name, limits::MAX_LABEL_NAME)?,
            color,
        })
    }
}

/// `GET /labels`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Html<String>> {
    let labels = state.tasks.list_labels(user.id)?;
    Ok(views::labels(&user, &labels, None))
}

/// `GET /labels/create`
pub async fn create_page(CurrentUser(user): CurrentUser) -> Html<String> {
    views::label_form(&user, None, "", DEFAULT_LABEL_COLOR, None)
}

/// `POST /labels/create`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<LabelForm>,
) -> AppResult<Response> {
    let result = form
        .to_input()
        .map_err(AppError::from)
        .and_then(|input| Ok(state.tasks.create_label(user.id, input)?));
    respond(result.map(|_| ()), &user, None, &form)
}

/// `GET /labels/{id}/edit`
pub async fn edit_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Html<String>> {
    let label = state
        .tasks
        .get_label(user.id, id)?
        .ok_or(AppError::NotFound("Label"))?;
    Ok(views::label_form(&user, Some(id), &label.name, &label.color, None))
}

/// `POST /labels/{id}/edit`
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
    Form(form): Form<LabelForm>,
) -> AppResult<Response> {
    let result = form
        .to_input()
        .map_err(AppError::from)
        .and_then(|input| Ok(state.tasks.update_label(user.id, id, input)?));
    respond(result.map(|_| ()), &user, Some(id), &form)
}

/// `POST /labels/{id}/delete`
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<RecordId>,
) -> AppResult<Redirect> {
    if !state.tasks.delete_label(user.id, id)? {
        return Err(AppError::NotFound("Label"));
    }
    Ok(Redirect::to("/labels"))
}

fn respond(
    result: AppResult<()>,
    user: &User,
    existing: Option<RecordId>,
    form: &LabelForm,
) -> AppResult<Response> {
    let error = match result {
        Ok(()) => return Ok(Redirect::to("/labels").into_response()),
        Err(AppError::Validation(e)) => e.to_string(),
        Err(AppError::Store(StoreError::Conflict(message))) => message,
        Err(e) => return Err(e),
    };
    let color = if form.color.trim().is_empty() {
        DEFAULT_LABEL_COLOR
    } else {
        form.color.as_str()
    };
    Ok(views::label_form(user, existing, &form.name, color, Some(&error)).into_response())
}
