//! HTTP router for the file manager API.
//!
//! This module maps the JSON API onto [`FileService`] operations. Handlers
//! only parse requests and shape responses; every path goes through the
//! service's resolver before anything touches the filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use filedeck_protocol::{
    CreateFolderRequest, ErrorCode, ErrorResponse, FileEntry, MessageResponse, PathQuery,
    RenameRequest,
};
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::files::{validate_name, FileError, FileService, OpenedFile, PendingUpload};

/// Shared handler state.
pub type AppState = Arc<FileService>;

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A file operation failed.
    #[error(transparent)]
    File(#[from] FileError),

    /// The request itself was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body exceeded the upload limit.
    #[error("request body too large")]
    PayloadTooLarge,
}

impl ApiError {
    /// The API error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::File(e) => e.code(),
            ApiError::BadRequest(_) => ErrorCode::InvalidRequest,
            ApiError::PayloadTooLarge => ErrorCode::PayloadTooLarge,
        }
    }

    fn client_message(&self) -> String {
        match self {
            ApiError::File(e) => e.client_message(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::PayloadTooLarge => "upload exceeds the maximum allowed size".to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(rejection.body_text())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        match code {
            ErrorCode::InternalError => error!(error = %self, "Request failed"),
            _ => debug!(error = %self, "Request rejected"),
        }

        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::new(self.client_message()))).into_response()
    }
}

/// Options for building the router.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Maximum accepted upload body in bytes.
    pub max_upload_size: usize,
    /// Directory served for every non-API path.
    pub static_dir: Option<PathBuf>,
}

impl RouterOptions {
    /// Derive router options from the daemon configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_size: usize::try_from(config.sandbox.max_upload_size)
                .unwrap_or(usize::MAX),
            static_dir: config.server.static_dir.clone(),
        }
    }
}

/// Build the API router around a file service.
pub fn build_router(service: AppState, options: RouterOptions) -> Router {
    let api = Router::new()
        .route("/api/files", get(list_files))
        .route("/api/download", get(download))
        .route("/api/preview", get(preview))
        .route("/api/delete", delete(delete_entry))
        .route("/api/rename", put(rename))
        .route("/api/create-folder", post(create_folder))
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(options.max_upload_size)),
        )
        .with_state(service);

    let app = match options.static_dir {
        Some(dir) => {
            debug!(dir = %dir.display(), "Serving static assets");
            api.fallback_service(ServeDir::new(dir))
        }
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
}

async fn list_files(
    State(service): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<FileEntry>>> {
    let Query(query) = query?;
    let dir = service.resolve(&query.path)?;
    let entries = service.list(&dir).await?;
    Ok(Json(entries.iter().map(|e| e.to_protocol()).collect()))
}

async fn download(
    State(service): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let path = service.resolve(&query.path)?;
    let opened = service.open(&path).await?;
    Ok(stream_file(
        opened,
        "attachment",
        HeaderValue::from_static("application/octet-stream"),
    ))
}

async fn preview(
    State(service): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = query?;
    let path = service.resolve(&query.path)?;
    let opened = service.open(&path).await?;

    let mime = mime_guess::from_path(&opened.name).first_or_octet_stream();
    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(stream_file(opened, "inline", content_type))
}

async fn delete_entry(
    State(service): State<AppState>,
    query: Result<Query<PathQuery>, QueryRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Query(query) = query?;
    let path = service.resolve(&query.path)?;
    service.delete(&path).await?;
    Ok(Json(MessageResponse::new("Deleted successfully")))
}

async fn rename(
    State(service): State<AppState>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    let old = service.resolve(&request.old_path)?;
    service.rename(&old, &request.new_name).await?;
    Ok(Json(MessageResponse::new("Renamed successfully")))
}

async fn create_folder(
    State(service): State<AppState>,
    payload: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    let parent = service.resolve(&request.path)?;
    service.create_folder(&parent, &request.name).await?;
    Ok(Json(MessageResponse::new("Folder created successfully")))
}

/// Accepts a `file` part and an optional `path` part, in either order.
///
/// The file part is streamed to a staging file as it arrives and moved into
/// place once the destination is known.
async fn upload(
    State(service): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let mut multipart = multipart?;
    let mut target = String::new();
    let mut staged: Option<(String, PendingUpload)> = None;

    if let Err(e) = receive_upload(&service, &mut multipart, &mut target, &mut staged).await {
        if let Some((_, pending)) = staged {
            pending.cancel().await;
        }
        return Err(e);
    }

    let Some((file_name, pending)) = staged else {
        return Err(ApiError::BadRequest("no file uploaded".into()));
    };

    let dest_dir = match service.resolve(&target) {
        Ok(dir) => dir,
        Err(e) => {
            pending.cancel().await;
            return Err(e.into());
        }
    };

    service
        .complete_upload(pending, &dest_dir, &file_name)
        .await?;
    Ok(Json(MessageResponse::new("File uploaded successfully")))
}

/// Read every multipart field, streaming the file part into `staged`.
async fn receive_upload(
    service: &FileService,
    multipart: &mut Multipart,
    target: &mut String,
    staged: &mut Option<(String, PendingUpload)>,
) -> ApiResult<()> {
    while let Some(mut field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("path") => *target = field.text().await?,
            Some("file") => {
                if staged.is_some() {
                    return Err(ApiError::BadRequest("only one file per upload".into()));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::BadRequest("uploaded file has no name".into()))?;
                validate_name(&file_name)?;

                let pending = service.start_upload().await?;
                let (_, pending) = staged.insert((file_name, pending));
                while let Some(chunk) = field.chunk().await? {
                    pending.write_chunk(&chunk).await?;
                }
            }
            other => {
                debug!(field = ?other, "Ignoring unexpected multipart field");
            }
        }
    }
    Ok(())
}

/// Stream an opened file as the response body.
fn stream_file(opened: OpenedFile, disposition: &'static str, content_type: HeaderValue) -> Response {
    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_LENGTH, HeaderValue::from(opened.size)),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(disposition, &opened.name),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(opened.file));
    (headers, body).into_response()
}

/// Build a `Content-Disposition` value carrying `name`.
///
/// The quoted `filename` is an ASCII fallback; `filename*` carries the exact
/// UTF-8 name percent-encoded.
fn content_disposition(disposition: &'static str, name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let value = format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        disposition,
        fallback,
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build Content-Disposition header");
        HeaderValue::from_static(disposition)
    })
}
