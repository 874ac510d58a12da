//! ChapterService — read-only chapter/level catalog
//!
//! Endpoints:
//! - GET /api/chapter
//! - GET /api/chapter/{id}
//! - GET /api/chapter/{id}/levels

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, Result};
use crate::models::{Chapter, LevelInfo};

use super::ApiState;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/api/chapter", get(list_chapters))
        .route("/api/chapter/{id}", get(get_chapter))
        .route("/api/chapter/{id}/levels", get(chapter_levels))
}

#[derive(Serialize)]
pub struct ChapterDetail {
    #[serde(flatten)]
    pub chapter: Chapter,
    pub levels: Vec<LevelInfo>,
}

async fn list_chapters(State(state): State<ApiState>) -> Result<Json<Vec<Chapter>>> {
    Ok(Json(state.storage.catalog.chapters().await?))
}

async fn get_chapter(
    State(state): State<ApiState>,
    Path(id): Path<i32>,
) -> Result<Json<ChapterDetail>> {
    let chapter = state
        .storage
        .catalog
        .chapter(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("chapter {}", id)))?;
    let levels = state.storage.catalog.chapter_levels(id).await?;
    Ok(Json(ChapterDetail { chapter, levels }))
}

async fn chapter_levels(
    State(state): State<ApiState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<LevelInfo>>> {
    state
        .storage
        .catalog
        .chapter(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("chapter {}", id)))?;
    Ok(Json(state.storage.catalog.chapter_levels(id).await?))
}
