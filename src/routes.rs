use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Multipart, State},
    response::{Html, Json},
    routing::{get, post},
};
use http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::models::{BookStats, ProcessResult};
use crate::services::book::{BookSummarizer, render_markdown};
use crate::services::chapterizer::split_chapters;
use crate::services::profile::KNOWN_MODELS;
use crate::services::stats;
use crate::utils::decode_utf8;

#[derive(Clone)]
pub struct AppState {
    pub summarizer: Arc<BookSummarizer>,
    pub output_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    let downloads = ServeDir::new(&state.output_dir);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/upload", post(upload_file))
        .route("/stats", post(book_stats))
        .nest_service("/download", downloads)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}

async fn index() -> Html<&'static str> {
    Html(
        r#"
    <!DOCTYPE html>
    <html>
    <head>
        <title>Book Summarizer Service</title>
        <meta charset="utf-8">
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
            .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
        </style>
    </head>
    <body>
        <h1>Book Summarizer Service</h1>

        <div class="info-box">
            <h2>Service Information</h2>
            <p>Upload the extracted text of a book, one chapter per blank-line separated block.</p>
            <p>Each chapter is titled, checked for worthiness and summarized chunk by chunk.</p>
        </div>

        <h2>Available Endpoints:</h2>
        <div class="endpoint">GET / - This information page</div>
        <div class="endpoint">GET /health - Health check</div>
        <div class="endpoint">POST /upload - Summarize a book (multipart field 'text_file')</div>
        <div class="endpoint">POST /stats - Word, token and cost statistics (multipart field 'text_file')</div>
        <div class="endpoint">GET /download/&lt;id&gt;.md - Fetch a finished summary</div>
    </body>
    </html>
    "#,
    )
}

async fn health_check() -> &'static str {
    "OK"
}

async fn read_text_file(mut multipart: Multipart) -> Result<String, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() == Some("text_file") {
            let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            return decode_utf8(data.to_vec()).map_err(|_| StatusCode::BAD_REQUEST);
        }
    }

    Err(StatusCode::BAD_REQUEST)
}

async fn upload_file(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResult>, StatusCode> {
    let text = read_text_file(multipart).await?;
    let chapters = split_chapters(&text);
    if chapters.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let chapter_count = chapters.len();
    let summary = state.summarizer.summarize_book(chapters).await;

    let summary_id = uuid::Uuid::new_v4().to_string();
    let filename = state.output_dir.join(format!("{summary_id}.md"));
    tokio::fs::create_dir_all(&state.output_dir)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "cannot create output directory");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tokio::fs::write(&filename, render_markdown(&summary))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, path = %filename.display(), "cannot write summary");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    tracing::info!(path = %filename.display(), chapters = chapter_count, "book summary saved");

    Ok(Json(ProcessResult {
        success: true,
        chapter_count,
        summarized_count: summary.summarized_count(),
        download_url: format!("/download/{summary_id}.md"),
    }))
}

async fn book_stats(multipart: Multipart) -> Result<Json<BookStats>, StatusCode> {
    let text = read_text_file(multipart).await?;
    let chapters = split_chapters(&text);
    if chapters.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Tokenizing a whole book is CPU-bound
    let report = tokio::task::spawn_blocking(move || stats::analyze(&chapters, KNOWN_MODELS))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            tracing::error!(error = %e, "cannot compute statistics");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::services::profile::ModelProfile;
    use crate::services::retry::RetryPolicy;
    use crate::services::summarizer::ChapterEngine;
    use crate::services::test_support::ScriptedClient;
    use crate::services::triage::Triage;
    use axum::body::{Body, to_bytes};
    use http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "XBOOKSUMX";

    fn state(output_dir: PathBuf) -> AppState {
        let prompts = Arc::new(Prompts::default());
        let replies = prompts.clone();
        let client = Arc::new(ScriptedClient::responding(move |call| {
            Some(Ok(if call.system_prompt == replies.chapter_prompt {
                "Chapter".to_string()
            } else if call.system_prompt == replies.worthiness_prompt {
                if call.instruction.contains("Contents") { "False" } else { "True" }.to_string()
            } else {
                "- a key point".to_string()
            }))
        }));
        let small = ModelProfile::from_name("gpt-3.5-turbo", client.clone()).unwrap();
        let large = ModelProfile::from_name("gpt-4o", client).unwrap();
        let engine = ChapterEngine::new(
            small.clone(),
            large.clone(),
            prompts.clone(),
            RetryPolicy::default(),
        );
        let triage = Triage::new(large, small, prompts, RetryPolicy::default(), 500);

        AppState {
            summarizer: Arc::new(BookSummarizer::new(triage, engine)),
            output_dir,
        }
    }

    fn temp_output() -> PathBuf {
        std::env::temp_dir().join(format!("booksum-out-{}", uuid::Uuid::new_v4()))
    }

    fn multipart_request(uri: &str, field: &str, content: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"book.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n{content}\r\n--{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(state(temp_output()));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn upload_writes_a_downloadable_summary() {
        let output_dir = temp_output();
        let app = router(state(output_dir.clone()));

        let response = app
            .clone()
            .oneshot(multipart_request(
                "/upload",
                "text_file",
                "Contents\n1. Down the Mine\n\nChapter 1\nThe miners work underground.",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["chapter_count"], 2);
        assert_eq!(json["summarized_count"], 1);

        let url = json["download_url"].as_str().unwrap().to_string();
        let response = app
            .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let document = String::from_utf8(bytes.to_vec()).unwrap();
        std::fs::remove_dir_all(&output_dir).unwrap();

        assert_eq!(
            document,
            "## Chapter\nEvaluated as not worth summarizing.\n\n## Chapter\n- a key point\n\n"
        );
    }

    #[tokio::test]
    async fn upload_without_text_field_is_rejected() {
        let app = router(state(temp_output()));
        let response = app
            .oneshot(multipart_request("/upload", "other", "Chapter 1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_book_is_rejected() {
        let app = router(state(temp_output()));
        let response = app
            .oneshot(multipart_request("/stats", "text_file", "\n\n"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn stats_reports_counts() {
        let app = router(state(temp_output()));
        let response = app
            .oneshot(multipart_request("/stats", "text_file", "one two\n\nthree"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["total_words"], 3);
        assert_eq!(json["chapter_words"], serde_json::json!([2, 1]));
        assert!(json["models"]["gpt-3.5-turbo"]["total_tokens"].as_u64().unwrap() >= 3);
    }
}
