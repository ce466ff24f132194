use super::*;

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let response = get(&app.router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_export_status_idle() {
    let app = test_app().await;

    let response = get(&app.router, "/export/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(body["phase"]["phase"], "idle");
}
