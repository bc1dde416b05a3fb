use axum::{
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::lifecycle::{self, DownloadError};
use crate::request::AudioFormat;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    url: Option<String>,
    format: Option<String>,
}

/// Root endpoint — service description.
pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let formats: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.extension()).collect();

    (
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        serde_json::json!({
            "service": "vidpull",
            "worker": state.worker.binary.display().to_string(),
            "formats": formats,
            "download": "/download?url=<video url>&format=mp3",
        })
        .to_string(),
    )
}

/// Download endpoint — validate, spawn a worker, stream its stdout.
///
/// Rejections and spawn failures produce structured JSON errors; those can
/// only be sent here, before the first body byte. Once the stream is
/// committed, a worker failure surfaces to the client as truncation.
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<DownloadParams>,
) -> Response {
    let locator = params.url.as_deref().unwrap_or("");

    let download = match lifecycle::start_download(&state.worker, locator, params.format.as_deref())
    {
        Ok(download) => download,
        Err(DownloadError::Rejected(e)) => {
            return error_response(StatusCode::BAD_REQUEST, e.reason(), &e.to_string());
        }
        Err(DownloadError::Spawn(e)) => {
            eprintln!("[server] {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "spawn_error",
                "failed to start download process",
            );
        }
    };

    let filename = format!("audio.{}", download.format.extension());
    if let Some(pid) = download.worker_id {
        println!("[server] worker {} streaming {}", pid, filename);
    }

    // Surface the terminal state on the log once the stream winds down.
    let mut events = download.events;
    tokio::spawn(async move {
        if let Ok(outcome) = events.wait_for(|s| s.is_terminal()).await {
            println!("[server] download finished: {:?}", *outcome);
        }
    });

    let body = Body::from_stream(ReceiverStream::new(download.body));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, download.format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(body)
        .unwrap()
}

fn error_response(status: StatusCode, reason: &str, message: &str) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        serde_json::json!({ "error": message, "reason": reason }).to_string(),
    )
        .into_response()
}
