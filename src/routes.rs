use axum::{Json, Router, extract::{DefaultBodyLimit, Path, State}, http::{StatusCode, header}, response::{IntoResponse, Response}, routing::{get, post, put}};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{CorsLayer, Any};
use uuid::Uuid;

use crate::{
    gemini::{GenerationError, Generator},
    mask::CanvasError,
    models::{tool_configs, GeneratedItem, ToolConfig, ToolKind},
    session::{submit, SessionError, SessionRegistry, SessionSnapshot, SharedSession, SubmitOutcome},
    tools::{PointerInput, ToolInput, ViewError, ViewSnapshot},
};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionRegistry>,
    pub generator: Arc<dyn Generator>,
}

impl AppState {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { sessions: Arc::default(), generator }
    }

    fn session(&self, id: &Uuid) -> Result<SharedSession, AppError> {
        self.sessions.get(id).ok_or(AppError::NotFound("session"))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")] NotFound(&'static str),
    #[error(transparent)] View(#[from] ViewError),
    #[error(transparent)] Generation(#[from] GenerationError),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::View(e) => AppError::View(e),
            SessionError::Generation(e) => AppError::Generation(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::View(ViewError::Busy | ViewError::NoActiveTool | ViewError::Unsupported(_)) => StatusCode::CONFLICT,
            AppError::View(ViewError::Canvas(CanvasError::Encode(_))) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::View(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        } else {
            tracing::warn!("⚠️ {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectToolRequest {
    pub tool: ToolKind,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/tools", get(list_tools))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(close_session))
        .route("/api/sessions/:id/tool", put(select_tool).delete(close_tool))
        // Uploads arrive as base64 JSON and are only bounded by the backend.
        .route("/api/sessions/:id/tool/input", post(apply_input).layer(DefaultBodyLimit::disable()))
        .route("/api/sessions/:id/tool/pointer", post(pointer_event))
        .route("/api/sessions/:id/tool/canvas", get(get_canvas))
        .route("/api/sessions/:id/tool/submit", post(submit_tool))
        .route("/api/sessions/:id/gallery", get(get_gallery))
        .route("/api/sessions/:id/blobs/:blob_id", get(get_blob))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn list_tools() -> Json<Vec<ToolConfig>> {
    Json(tool_configs())
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionSnapshot>) {
    let session = state.sessions.create();
    let snapshot = session.lock().snapshot();
    (StatusCode::CREATED, Json(snapshot))
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.session(&id)?;
    let snapshot = session.lock().snapshot();
    Ok(Json(snapshot))
}

pub async fn close_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> StatusCode {
    if state.sessions.remove(&id) { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND }
}

pub async fn select_tool(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<SelectToolRequest>,
) -> Result<Json<ViewSnapshot>, AppError> {
    let session = state.session(&id)?;
    let mut guard = session.lock();
    let s = &mut *guard;
    let mounted = s.router.select(body.tool);
    Ok(Json(mounted.view.snapshot(mounted.mount_id, s.gallery.items())))
}

pub async fn close_tool(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    let session = state.session(&id)?;
    let mut s = session.lock();
    s.router.back();
    Ok(Json(s.snapshot()))
}

pub async fn apply_input(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<ToolInput>,
) -> Result<Json<ViewSnapshot>, AppError> {
    let session = state.session(&id)?;
    let mut s = session.lock();
    s.router.active_mut()?.view.apply_input(body)?;
    Ok(Json(s.view_snapshot().ok_or(ViewError::NoActiveTool)?))
}

pub async fn pointer_event(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<PointerInput>,
) -> Result<Json<ViewSnapshot>, AppError> {
    let session = state.session(&id)?;
    let mut s = session.lock();
    s.router.active_mut()?.view.pointer(body)?;
    Ok(Json(s.view_snapshot().ok_or(ViewError::NoActiveTool)?))
}

pub async fn get_canvas(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Response, AppError> {
    let session = state.session(&id)?;
    let png = {
        let s = session.lock();
        let mounted = s.router.active().ok_or(ViewError::NoActiveTool)?;
        let canvas = mounted.view.canvas().ok_or(AppError::NotFound("canvas"))?;
        canvas.export_png().map_err(ViewError::from)?
    };
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

pub async fn submit_tool(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<SubmitOutcome>, AppError> {
    let session = state.session(&id)?;
    let outcome = submit(&session, state.generator.as_ref()).await?;
    Ok(Json(outcome))
}

pub async fn get_gallery(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Vec<GeneratedItem>>, AppError> {
    let session = state.session(&id)?;
    let items = session.lock().gallery.items().to_vec();
    Ok(Json(items))
}

pub async fn get_blob(Path((id, blob_id)): Path<(Uuid, Uuid)>, State(state): State<AppState>) -> Result<Response, AppError> {
    let session = state.session(&id)?;
    let blob = session.lock().blobs.get(&blob_id).cloned().ok_or(AppError::NotFound("blob"))?;
    Ok(([(header::CONTENT_TYPE, blob.mime_type)], blob.bytes).into_response())
}
