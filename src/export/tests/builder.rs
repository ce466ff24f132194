use super::*;

fn store() -> MemoryStore {
    MemoryStore {
        wiki: wiki(),
        pages: animal_pages(),
    }
}

#[test]
fn test_format_fallbacks() {
    let builder = ExportBuilder::new(10, wiki(), "", UserRef::system(), None).unwrap();
    assert_eq!(builder.format(), ExportFormat::Epub, "wiki default");

    let user = UserRef {
        id: 7,
        display_name: "Ada Tutor".into(),
        preferred_format: Some(ExportFormat::Pdf),
    };
    let builder = ExportBuilder::new(10, wiki(), "  ", user.clone(), None).unwrap();
    assert_eq!(builder.format(), ExportFormat::Pdf, "user preference");

    let builder = ExportBuilder::new(10, wiki(), "EPUB", user, None).unwrap();
    assert_eq!(builder.format(), ExportFormat::Epub, "explicit format wins");
}

#[test]
fn test_unknown_format_and_wrong_context() {
    let err = ExportBuilder::new(10, wiki(), "docx", UserRef::system(), None).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(f) if f == "docx"));

    let err = ExportBuilder::new(11, wiki(), "pdf", UserRef::system(), None).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_build_hands_pages_in_order() {
    let renderer = RecordingRenderer::default();
    let user = UserRef {
        id: 3,
        display_name: "Ada".into(),
        preferred_format: None,
    };

    let artifact = ExportBuilder::new(10, wiki(), "pdf", user, None)
        .unwrap()
        .generated_at(fixed_time())
        .build(&store(), &renderer)
        .await
        .unwrap();

    assert_eq!(artifact.filename, "Export_Example_wiki_2025-10-18.pdf");
    assert_eq!(artifact.format, ExportFormat::Pdf);
    assert_eq!(artifact.page_count, 5);
    assert_eq!(artifact.bytes, b"Home,Cats,Dogs,Cows,Puppies");

    let calls = renderer.calls.lock().unwrap();
    let (_, format, author) = &calls[0];
    assert_eq!(*format, ExportFormat::Pdf);
    assert_eq!(author, "Ada");
}

#[tokio::test]
async fn test_build_with_selection() {
    let renderer = RecordingRenderer::default();
    let artifact = ExportBuilder::new(
        10,
        wiki(),
        "epub",
        UserRef::system(),
        Some(vec!["Cows".into(), "Home".into()]),
    )
    .unwrap()
    .build(&store(), &renderer)
    .await
    .unwrap();

    assert_eq!(artifact.page_count, 2);
    let pages = renderer.last_pages();
    assert_eq!(pages[0].title, "Home");
    // Cats is not exported, so its link becomes plain text
    assert!(pages[0].html.contains("Info about Cats, Dogs and <a href=\"#page-cows\">Cows</a>"));
}

#[tokio::test]
async fn test_selection_of_unknown_pages_only() {
    let renderer = RecordingRenderer::default();
    let err = ExportBuilder::new(10, wiki(), "epub", UserRef::system(), Some(vec!["Nope".into()]))
        .unwrap()
        .build(&store(), &renderer)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(renderer.call_count(), 0);
}

#[tokio::test]
async fn test_missing_entry_page_is_not_found() {
    let mut store = store();
    store.pages.retain(|p| p.title != "Home");

    let err = ExportBuilder::new(10, wiki(), "pdf", UserRef::system(), None)
        .unwrap()
        .build(&store, &RecordingRenderer::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(msg) if msg.contains("entry page 'Home'")));
}

#[tokio::test]
async fn test_rejected_page_fails_whole_export() {
    let renderer = RecordingRenderer {
        reject: Some("Dogs".into()),
        ..Default::default()
    };

    let err = ExportBuilder::new(10, wiki(), "pdf", UserRef::system(), None)
        .unwrap()
        .build(&store(), &renderer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Render(RenderError::Rejected { ref page, .. }) if page == "Dogs"
    ));
}

#[tokio::test]
async fn test_render_timeout() {
    let renderer = RecordingRenderer {
        delay: Some(Duration::from_secs(5)),
        ..Default::default()
    };
    let config = ExportConfig {
        render_timeout: Duration::from_millis(20),
        ..Default::default()
    };

    let err = ExportBuilder::new(10, wiki(), "pdf", UserRef::system(), None)
        .unwrap()
        .with_config(&config)
        .build(&store(), &renderer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Render(RenderError::Timeout(d)) if d == Duration::from_millis(20)
    ));
}

#[tokio::test]
async fn test_unsupported_format_fails_before_loading() {
    let renderer = DefaultRenderer::new(None);
    let err = ExportBuilder::new(10, wiki(), "pdf", UserRef::system(), None)
        .unwrap()
        .build(&store(), &renderer)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::Unsupported(f)) if f == "pdf"));
}

#[tokio::test]
async fn test_cache_hit_skips_renderer() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExportConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let renderer = RecordingRenderer::default();
    let builder = ExportBuilder::new(10, wiki(), "pdf", UserRef::system(), None)
        .unwrap()
        .with_config(&config)
        .generated_at(fixed_time());

    let first = builder.build(&store(), &renderer).await.unwrap();
    let second = builder.build(&store(), &renderer).await.unwrap();
    assert_eq!(renderer.call_count(), 1, "second build is served from cache");
    assert_eq!(first.bytes, second.bytes);

    // An edit invalidates the cached artifact
    let mut edited = store();
    edited.pages[0].content.push_str("<p>new</p>");
    builder.build(&edited, &renderer).await.unwrap();
    assert_eq!(renderer.call_count(), 2);
}

#[tokio::test]
async fn test_default_renderer_builds_epub() {
    let artifact = ExportBuilder::new(10, wiki(), "", UserRef::system(), None)
        .unwrap()
        .generated_at(fixed_time())
        .build(&store(), &DefaultRenderer::new(None))
        .await
        .unwrap();

    assert_eq!(artifact.filename, "Export_Example_wiki_2025-10-18.epub");
    assert_eq!(artifact.content_type(), "application/epub+zip");
    assert!(artifact.bytes.starts_with(b"PK"));
}
