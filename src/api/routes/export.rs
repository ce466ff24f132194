//! Export handlers: on-demand export, scheduled run trigger, status.

use super::ExportQuery;
use crate::Result;
use crate::api::AppState;
use crate::export::ExportBuilder;
use crate::types::{UserRef, WikiId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /wikis/:id/export - Export a wiki as PDF or EPUB
pub async fn export_wiki(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let scheduler = &state.scheduler;
    let wiki = scheduler.wikis().wiki(WikiId(id)).await?;

    let user = UserRef {
        id: query.user.unwrap_or(0),
        display_name: query
            .author
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UserRef::system().display_name),
        preferred_format: None,
    };
    let context_id = query.context.unwrap_or(wiki.cmid);

    let artifact = ExportBuilder::new(
        context_id,
        wiki,
        query.format.as_deref().unwrap_or(""),
        user,
        query.selection(),
    )?
    .with_config(&scheduler.config().export)
    .build(scheduler.wikis().as_ref(), scheduler.renderer().as_ref())
    .await?;

    let disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes,
    )
        .into_response())
}

/// POST /export/run - Run a scheduled export now
pub async fn run_export(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let report = state.scheduler.execute().await?;
    Ok(Json(report))
}

/// GET /export/status - Current scheduler phase
pub async fn export_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "phase": state.scheduler.phase() }))
}
