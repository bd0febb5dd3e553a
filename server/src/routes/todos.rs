use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use todo_core::{
    AddNote, CreateTodo, FieldError, ListParams, Pagination, ShareTodo, Todo, TodoStatistics,
    TodoView, UpdateTodo, ValidationError,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{self, CurrentUser},
    error::ApiError,
    extract::{ValidJson, ValidQuery},
    response::ApiResponse,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub todos: Vec<TodoView>,
    pub pagination: Pagination,
    pub stats: TodoStatistics,
}

#[derive(Debug, Serialize)]
pub struct TodoData {
    pub todo: TodoView,
}

impl TodoData {
    fn new(todo: Todo) -> Self {
        Self {
            todo: TodoView::new(todo, Utc::now()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsData {
    pub stats: TodoStatistics,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearedData {
    pub deleted_count: u64,
}

type JsonResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Ids that do not parse cannot name a todo the caller can see.
fn todo_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::todo_not_found())
}

pub async fn list_todos(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ValidQuery(params): ValidQuery<ListParams>,
) -> JsonResult<TodoList> {
    let (filters, page) = params.parse()?;
    let owner = user.id();
    let now = Utc::now();

    let todos = state.repo.find_by_owner(owner, filters, page).await?;
    let profiles = state.repo.sharing_profiles(&todos).await?;
    let total = state.repo.count_by_owner(owner).await?;
    let stats = state.repo.get_statistics(owner, now).await?;

    let todos = todos
        .into_iter()
        .map(|t| TodoView::new(t, now).resolve_sharing(&profiles))
        .collect();
    Ok(Json(ApiResponse::success(TodoList {
        todos,
        pagination: Pagination::new(page, total),
        stats,
    })))
}

pub async fn get_todo(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> JsonResult<TodoData> {
    let id = todo_id(&id)?;
    let todo = state
        .repo
        .find_visible(id, user.id())
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    let profiles = state.repo.sharing_profiles(std::slice::from_ref(&todo)).await?;
    Ok(Json(ApiResponse::success(TodoData {
        todo: TodoView::new(todo, Utc::now()).resolve_sharing(&profiles),
    })))
}

pub async fn create_todo(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ValidJson(payload): ValidJson<CreateTodo>,
) -> Result<(StatusCode, Json<ApiResponse<TodoData>>), ApiError> {
    let input = payload.validate()?;
    let todo = state.repo.create(user.id(), input, Utc::now()).await?;
    tracing::info!(todo_id = %todo.id, owner = %todo.owner, "Todo created");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            "Todo created successfully",
            TodoData::new(todo),
        )),
    ))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateTodo>,
) -> JsonResult<TodoData> {
    let changes = payload.validate()?;
    let id = todo_id(&id)?;
    let mut todo = state
        .repo
        .find_owned(id, user.id())
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    todo.apply(changes, Utc::now());
    let todo = state
        .repo
        .save(todo)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    Ok(Json(ApiResponse::success_with_message(
        "Todo updated successfully",
        TodoData::new(todo),
    )))
}

pub async fn toggle_todo(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> JsonResult<TodoData> {
    let id = todo_id(&id)?;
    let mut todo = state
        .repo
        .find_owned(id, user.id())
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    todo.toggle(Utc::now());
    let todo = state
        .repo
        .save(todo)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    let message = format!("Todo marked as {}", status_word(&todo));
    Ok(Json(ApiResponse::success_with_message(
        message,
        TodoData::new(todo),
    )))
}

fn status_word(todo: &Todo) -> &'static str {
    if todo.is_completed {
        "completed"
    } else {
        "pending"
    }
}

pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> JsonResult<()> {
    let id = todo_id(&id)?;
    state
        .repo
        .delete_owned(id, user.id())
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    tracing::info!(todo_id = %id, owner = %user.id(), "Todo deleted");
    Ok(Json(ApiResponse::message("Todo deleted successfully")))
}

pub async fn clear_completed(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> JsonResult<ClearedData> {
    let deleted_count = state.repo.clear_completed(user.id()).await?;
    Ok(Json(ApiResponse::success_with_message(
        format!("Cleared {deleted_count} completed todos"),
        ClearedData { deleted_count },
    )))
}

pub async fn stats_summary(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> JsonResult<StatsData> {
    let stats = state.repo.get_statistics(user.id(), Utc::now()).await?;
    Ok(Json(ApiResponse::success(StatsData { stats })))
}

pub async fn share_todo(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<ShareTodo>,
) -> JsonResult<TodoData> {
    let id = todo_id(&id)?;
    let mut todo = state
        .repo
        .find_owned(id, user.id())
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    if payload.user == user.id() {
        return Err(ValidationError::single(FieldError::body(
            "user",
            "Cannot share a todo with its owner",
        ))
        .into());
    }
    if state.repo.find_user(payload.user).await?.is_none() {
        return Err(ValidationError::single(FieldError::body("user", "User not found")).into());
    }
    todo.share(payload.user, payload.permission, Utc::now());
    let todo = state
        .repo
        .save(todo)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    tracing::info!(
        todo_id = %todo.id,
        shared_with = %payload.user,
        permission = payload.permission.as_str(),
        "Todo shared"
    );
    Ok(Json(ApiResponse::success_with_message(
        "Todo shared successfully",
        TodoData::new(todo),
    )))
}

pub async fn add_note(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<AddNote>,
) -> Result<(StatusCode, Json<ApiResponse<TodoData>>), ApiError> {
    let content = payload.validate()?;
    let id = todo_id(&id)?;
    let mut todo = state
        .repo
        .find_owned(id, user.id())
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    todo.add_note(user.id(), content, Utc::now());
    let todo = state
        .repo
        .save(todo)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            "Note added successfully",
            TodoData::new(todo),
        )),
    ))
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_todos).post(create_todo))
        .route("/clear-completed", delete(clear_completed))
        .route("/stats/summary", get(stats_summary))
        .route("/{id}", get(get_todo).put(update_todo).delete(delete_todo))
        .route("/{id}/toggle", patch(toggle_todo))
        .route("/{id}/share", post(share_todo))
        .route("/{id}/notes", post(add_note))
        .layer(from_fn_with_state(state.clone(), auth::require_user))
}
