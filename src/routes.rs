use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppResult,
    models::{
        ActorSummary, AwardSummary, MovieDetails, MovieUpdate, NewActor, NewAward, NewMovie, Page,
        Scope,
    },
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", get(get_movie).patch(update_movie).delete(delete_movie))
        .route("/movies/{id}/restore", post(restore_movie))
        .route("/movies/{id}/actors/{actor_id}", put(link_actor))
        .route("/movies/{id}/awards", post(create_award))
        .route("/actors", post(create_actor))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    include_deleted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    include_deleted: bool,
    limit: Option<u64>,
    offset: Option<u64>,
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewMovie>,
) -> AppResult<(StatusCode, Json<MovieDetails>)> {
    let movie = state.store.create_movie(new).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<MovieDetails>>> {
    let page = Page {
        limit: q
            .limit
            .unwrap_or(state.config.default_page_size)
            .clamp(1, state.config.max_page_size),
        offset: q.offset.unwrap_or(0),
    };
    let movies = state.store.list_movies(Scope::from_flag(q.include_deleted), page).await?;
    Ok(Json(movies))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<ScopeQuery>,
) -> AppResult<Json<MovieDetails>> {
    let movie = state.store.get_movie(id, Scope::from_flag(q.include_deleted)).await?;
    Ok(Json(movie))
}

pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<MovieUpdate>,
) -> AppResult<Json<MovieDetails>> {
    let movie = state.store.update_movie(id, update).await?;
    Ok(Json(movie))
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.store.soft_delete_movie(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MovieDetails>> {
    let movie = state.store.restore_movie(id).await?;
    Ok(Json(movie))
}

pub async fn link_actor(
    State(state): State<Arc<AppState>>,
    Path((id, actor_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.store.link_actor(id, actor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_award(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(new): Json<NewAward>,
) -> AppResult<(StatusCode, Json<AwardSummary>)> {
    let award = state.store.create_award(id, new).await?;
    Ok((StatusCode::CREATED, Json(award)))
}

pub async fn create_actor(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewActor>,
) -> AppResult<(StatusCode, Json<ActorSummary>)> {
    let actor = state.store.create_actor(new).await?;
    Ok((StatusCode::CREATED, Json(actor)))
}
