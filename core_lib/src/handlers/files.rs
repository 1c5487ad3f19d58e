use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info};

use crate::{
    error::{AppError, Result},
    files::{FileRecord, FileUpload, Preview},
    AppState,
};

const EMPTY_UPLOAD_MESSAGE: &str = "Please select a file to upload";

pub fn create_file_routes() -> Router<AppState> {
    Router::new()
        .route("/files", get(list_files))
        .route("/files/upload", post(upload_file))
        .route("/files/preview/:name", get(preview_file))
        .route("/files/:name", get(download_file).delete(delete_file))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart data: {}", err.body_text()))
    }
}

fn content_disposition(kind: &str, filename: &str) -> String {
    format!("{}; filename=\"{}\"", kind, filename.replace('"', "\\\""))
}

pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<FileRecord>> {
    let mut file_upload: Option<FileUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let media_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        file_upload = Some(FileUpload {
            original_name,
            media_type,
            size_bytes: data.len() as u64,
            data,
        });
        break;
    }

    let upload = match file_upload {
        Some(upload) if !upload.data.is_empty() => upload,
        _ => {
            error!("Failed to upload empty file");
            return Err(AppError::BadRequest(EMPTY_UPLOAD_MESSAGE.to_string()));
        }
    };

    let record = state.file_manager.upload(upload).await.map_err(|e| {
        error!("Error uploading file: {}", e);
        e
    })?;

    Ok(Json(record))
}

pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>> {
    let files = state.file_manager.list().await.map_err(|e| {
        error!("Error listing files: {}", e);
        e
    })?;

    Ok(Json(files))
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let download = state.file_manager.download(&name).await?.ok_or_else(|| {
        error!("File not found: {}", name);
        AppError::NotFound("File not found".to_string())
    })?;

    let headers = [
        (header::CONTENT_TYPE, download.media_type),
        (
            header::CONTENT_DISPOSITION,
            content_disposition("attachment", &download.stored_name),
        ),
        (
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
        (header::EXPIRES, "0".to_string()),
    ];

    Ok((StatusCode::OK, headers, download.data).into_response())
}

pub async fn preview_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let preview = state.file_manager.preview(&name).await?.ok_or_else(|| {
        error!("File not found: {}", name);
        AppError::NotFound("File not found".to_string())
    })?;

    let inline = content_disposition("inline", &name);

    let response = match preview {
        Preview::Text { media_type, content } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, media_type),
                (header::CONTENT_DISPOSITION, inline),
            ],
            content,
        )
            .into_response(),
        Preview::Inline { media_type, data } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, media_type),
                (header::CONTENT_DISPOSITION, inline),
            ],
            data,
        )
            .into_response(),
        Preview::Unavailable => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime::TEXT_PLAIN.to_string()),
                (header::CONTENT_DISPOSITION, inline),
            ],
            Preview::UNAVAILABLE_MESSAGE,
        )
            .into_response(),
    };

    Ok(response)
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    if state.file_manager.delete(&name).await? {
        info!("DELETE /files/{} - removed", name);
        Ok(StatusCode::OK)
    } else {
        error!("File not found for deletion: {}", name);
        Err(AppError::NotFound("File not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{FileManager, LocalBlobStore, MemoryFileRepository};
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "filedesk-test-boundary";
    const PNG_BYTES: [u8; 10] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x01, 0x02];

    async fn setup_test_app() -> (Router, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let file_manager = FileManager::new(
            Arc::new(MemoryFileRepository::new()),
            Arc::new(LocalBlobStore::new(temp_dir.path().join("uploads"))),
        );
        file_manager.initialize().await.unwrap();

        let app = create_file_routes().with_state(AppState::new(file_manager));
        (app, temp_dir)
    }

    fn multipart_body(field: &str, filename: Option<&str>, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    field, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n", field).as_bytes(),
            ),
        }
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/files/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body("file", Some(filename), content_type, data)))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_upload_returns_record() {
        let (app, _temp_dir) = setup_test_app().await;

        let response = app
            .oneshot(upload_request("report.txt", "text/plain", b"quarterly numbers"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let record = body_json(response).await;
        assert_eq!(record["storedName"], "report.txt");
        assert_eq!(record["originalName"], "report.txt");
        assert_eq!(record["mediaType"], "text/plain");
        assert_eq!(record["sizeBytes"], 17);
    }

    #[tokio::test]
    async fn test_upload_duplicate_names() {
        let (app, _temp_dir) = setup_test_app().await;

        for expected in ["report.txt", "report(1).txt", "report(2).txt"] {
            let response = app
                .clone()
                .oneshot(upload_request("report.txt", "text/plain", b"data"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["storedName"], expected);
        }

        let response = app.oneshot(get_request("/files")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (app, _temp_dir) = setup_test_app().await;

        let response = app
            .clone()
            .oneshot(upload_request("tool.exe", "application/octet-stream", b"MZ"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = body_json(response).await;
        assert!(error["error"].as_str().unwrap().starts_with("type not allowed"));

        let response = app
            .clone()
            .oneshot(upload_request("empty.txt", "text/plain", b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], EMPTY_UPLOAD_MESSAGE);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/files/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body("other", None, "text/plain", b"value")))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get_request("/files")).await.unwrap();
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_download_headers_and_bytes() {
        let (app, _temp_dir) = setup_test_app().await;
        let payload = br#"{"key":"value"}"#;

        app.clone()
            .oneshot(upload_request("a.json", "application/json", payload))
            .await
            .unwrap();

        let response = app.oneshot(get_request("/files/a.json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"a.json\"");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store, must-revalidate");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");

        assert_eq!(body_bytes(response).await, payload.to_vec());
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let (app, _temp_dir) = setup_test_app().await;

        let response = app.oneshot(get_request("/files/nothing.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_preview_text_and_image() {
        let (app, _temp_dir) = setup_test_app().await;

        app.clone()
            .oneshot(upload_request("notes.txt", "text/plain", b"hello preview"))
            .await
            .unwrap();
        app.clone()
            .oneshot(upload_request("pic.png", "image/png", &PNG_BYTES))
            .await
            .unwrap();

        let response = app.clone().oneshot(get_request("/files/preview/notes.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        assert_eq!(body_bytes(response).await, b"hello preview".to_vec());

        let response = app.clone().oneshot(get_request("/files/preview/pic.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "inline; filename=\"pic.png\""
        );
        assert_eq!(body_bytes(response).await, PNG_BYTES.to_vec());

        let response = app.oneshot(get_request("/files/preview/missing.png")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (app, temp_dir) = setup_test_app().await;

        app.clone()
            .oneshot(upload_request("old.txt", "text/plain", b"old"))
            .await
            .unwrap();

        let delete = |uri: &str| {
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(delete("/files/old.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!temp_dir.path().join("uploads").join("old.txt").exists());

        let response = app.clone().oneshot(delete("/files/old.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/files/old.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("attachment", "say \"hi\".txt"),
            "attachment; filename=\"say \\\"hi\\\".txt\""
        );
    }
}
