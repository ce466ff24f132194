use super::*;
use crate::config::Config;
use crate::db::{Database, NewPage, NewWiki};
use crate::error::{ApiError, RenderError};
use crate::export::{DocumentRenderer, EpubRenderer, RenderMetadata, RenderedPage};
use crate::notify::MemoryMailSink;
use crate::store::RunStateStore;
use crate::types::{ExportFormat, WikiId};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use tempfile::NamedTempFile;
use tower::ServiceExt;

mod system;

/// EPUB is packaged for real; PDF rendering rejects pages titled "Broken"
struct TestRenderer;

#[async_trait]
impl DocumentRenderer for TestRenderer {
    async fn render(
        &self,
        pages: &[RenderedPage],
        format: ExportFormat,
        meta: &RenderMetadata,
    ) -> std::result::Result<Vec<u8>, RenderError> {
        match format {
            ExportFormat::Epub => EpubRenderer::new().render(pages, format, meta).await,
            ExportFormat::Pdf => match pages.iter().find(|p| p.title == "Broken") {
                Some(page) => Err(RenderError::Rejected {
                    page: page.title.clone(),
                    reason: "unsupported markup".into(),
                }),
                None => Ok(b"%PDF-1.4 test".to_vec()),
            },
        }
    }

    fn supports(&self, _format: ExportFormat) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

struct TestApp {
    router: Router,
    db: Arc<Database>,
    sink: Arc<MemoryMailSink>,
    wiki_id: WikiId,
    _temp_file: NamedTempFile,
}

/// Router over a database holding one wiki ("Example wiki", cmid 10)
async fn test_app() -> TestApp {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(temp_file.path()).await.unwrap());
    let sink = Arc::new(MemoryMailSink::new());

    let wiki_id = db
        .insert_wiki(&NewWiki {
            course_id: 2,
            cmid: 10,
            name: "Example wiki".into(),
            first_page_title: "Home".into(),
            default_format: ExportFormat::Pdf,
        })
        .await
        .unwrap();
    for (title, content) in [
        ("Home", "<p>Start: [[Cats]] and [[Broken]]</p>"),
        ("Cats", "<p>Meow</p>"),
        ("Broken", "<p>Unrenderable</p>"),
    ] {
        db.insert_page(&NewPage {
            wiki_id,
            title: title.into(),
            content: content.into(),
            time_modified: 2_000,
        })
        .await
        .unwrap();
    }

    let scheduler = Arc::new(ExportScheduler::new(
        Config::default(),
        db.clone(),
        db.clone(),
        Arc::new(TestRenderer),
        sink.clone(),
    ));

    TestApp {
        router: create_router(scheduler),
        db,
        sink,
        wiki_id,
        _temp_file: temp_file,
    }
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn post(router: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn api_error(response: Response) -> ApiError {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(temp_file.path()).await.unwrap());
    let mut config = Config::default();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap();

    let scheduler = Arc::new(ExportScheduler::new(
        config,
        db.clone(),
        db,
        Arc::new(TestRenderer),
        Arc::new(MemoryMailSink::new()),
    ));
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(start_api_server(scheduler, shutdown.clone()));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}
