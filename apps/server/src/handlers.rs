use crate::error::{ApiError, ApiErrorExt};
use crate::preview;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use http_body_util::BodyExt;
use limbo_storage::{FileStore, FileWriter};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::LazyLock;
use std::time::{Instant, SystemTime};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::info;

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

const NO_CACHE: [(header::HeaderName, &str); 3] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileView {
    name: String,
    url: String,
    url_name: String,
    size: u64,
    size_text: String,
    age_seconds: u64,
    age_text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadedView {
    name: String,
    size: u64,
    stored: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TextRequest {
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoveRequest {
    file_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RemovedView {
    removed: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime: u64,
}

pub(crate) async fn health() -> impl IntoResponse {
    let body = HealthResponse {
        status: "up",
        version: env!("CARGO_PKG_VERSION"),
        uptime: START_TIME.elapsed().as_secs(),
    };
    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(body),
    )
}

/// Newest first.
pub(crate) async fn list_files(
    State(state): State<AppState>,
) -> Result<Json<Vec<FileView>>, ApiError> {
    let now = SystemTime::now();
    let mut files: Vec<FileView> = state
        .store
        .enumerate()
        .await?
        .into_iter()
        .map(|entry| {
            let age_seconds = now.duration_since(entry.modified).unwrap_or_default().as_secs();
            FileView {
                url: preview::download_url(&state.url_base, entry.url_name()),
                name: entry.display_name().to_owned(),
                url_name: entry.url_name().to_owned(),
                size: entry.size,
                size_text: preview::human_size(entry.size),
                age_seconds,
                age_text: preview::human_age(age_seconds),
            }
        })
        .collect();
    files.sort_by(|a, b| a.age_seconds.cmp(&b.age_seconds).then_with(|| a.name.cmp(&b.name)));
    Ok(Json(files))
}

/// Streams the raw request body into a new file named `name`.
pub(crate) async fn upload(
    State(store): State<FileStore>,
    Path(name): Path<String>,
    body: Body,
) -> Result<(StatusCode, Json<UploadedView>), ApiError> {
    let mut writer = store.open_writer(&name).await?;
    let mut stream = BodyExt::into_data_stream(body);

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                writer.abort();
                return Err(ApiError::BadRequest {
                    message: err.to_string().into(),
                    context: Some("Upload interrupted".into()),
                });
            },
        };
        if let Err(err) = writer.write(&chunk).await {
            writer.abort();
            return Err(err.into());
        }
    }

    finish(writer).await
}

/// Stores a text snippet as `<title>.txt`.
pub(crate) async fn add_text(
    State(store): State<FileStore>,
    payload: Result<Json<TextRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UploadedView>), ApiError> {
    let Json(request) = payload?;
    let mut writer = store.open_writer(&format!("{}.txt", request.title)).await?;
    if let Err(err) = writer.write(request.body.as_bytes()).await {
        writer.abort();
        return Err(err.into());
    }
    finish(writer).await
}

async fn finish(writer: FileWriter) -> Result<(StatusCode, Json<UploadedView>), ApiError> {
    let name = writer.name().display_name().to_owned();
    let size = writer.written();
    let stored = writer.commit().await.context("Publishing upload")?.is_some();
    info!(name = %name, size, stored, "Upload finished");
    Ok((StatusCode::CREATED, Json(UploadedView { name, size, stored })))
}

pub(crate) async fn remove(
    State(store): State<FileStore>,
    payload: Result<Json<RemoveRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    store.remove(&request.file_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn remove_all(
    State(store): State<FileStore>,
) -> Result<Json<RemovedView>, ApiError> {
    let removed = store.remove_all().await?;
    Ok(Json(RemovedView { removed }))
}

/// Serves a stored file, previewing text and images in the browser.
pub(crate) async fn download(
    State(store): State<FileStore>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let location = store.read_info(&name)?;
    let not_found = || ApiError::NotFound {
        message: location.display_name().to_owned().into(),
        context: None,
    };

    let file = match File::open(location.path()).await {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(err) => {
            return Err(ApiError::Io {
                source: err,
                context: Some(format!("Opening {}", location.disk_name()).into()),
            });
        },
    };
    let meta = file.metadata().await.context(format!("Reading {}", location.disk_name()))?;
    if !meta.is_file() {
        return Err(not_found());
    }

    let presentation = preview::classify(location.display_name());
    let disposition = preview::content_disposition(location.display_name(), presentation.inline);
    info!(name = %location.name, size = meta.len(), inline = presentation.inline, "File download");

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    for (key, value) in NO_CACHE {
        headers.insert(key, HeaderValue::from_static(value));
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.len()));
    headers.insert(header::CONTENT_TYPE, header_value(presentation.content_type)?);
    headers.insert(header::CONTENT_DISPOSITION, header_value(disposition)?);
    Ok(response)
}

fn header_value(value: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::try_from(value).map_err(|e| ApiError::Internal {
        message: e.to_string().into(),
        context: Some("Invalid response header".into()),
    })
}
