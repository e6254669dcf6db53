//! Song catalog management

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use super::{ApiError, ApiState};
use crate::Error;
use crate::db::{Song, SongRepo};

#[derive(Debug, Deserialize)]
pub struct SongRequest {
    pub title: String,
    pub identifier: String,
    #[serde(default)]
    pub artist: Option<String>,
}

fn catalog(state: &ApiState) -> Result<&SongRepo, ApiError> {
    state
        .songs
        .as_ref()
        .ok_or(ApiError(Error::NotConfigured("song catalog")))
}

async fn list(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Song>>, ApiError> {
    Ok(Json(catalog(&state)?.list()?))
}

async fn upsert(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<SongRequest>,
) -> Result<(StatusCode, Json<Song>), ApiError> {
    let song = catalog(&state)?.upsert(&req.title, &req.identifier, req.artist.as_deref())?;
    tracing::info!(id = song.id, title = %song.title, "song saved");
    Ok((StatusCode::CREATED, Json(song)))
}

async fn remove(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if catalog(&state)?.delete(id)? {
        tracing::info!(id, "song deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError(Error::NotFound(format!("song {id}"))))
    }
}

/// Build the song catalog router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list).post(upsert))
        .route("/{id}", delete(remove))
        .with_state(state)
}
