//! HTTP endpoints
//!
//! Each route parses its path key, runs the query on the blocking pool and
//! returns the outcome as JSON. Descriptive fallbacks are 200 responses with a
//! string body; only bad input and load failures become error responses.
use actix_web::{web, HttpResponse};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::services::{AnalyticsService, SimilarityRecommender};
use crate::store::{TableName, TableStore};

const SERVICE_NAME: &str = "game-analytics-service";

/// Shared, read-only state handed to every worker
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TableStore>,
    pub analytics: Arc<AnalyticsService>,
    pub recommender: Arc<SimilarityRecommender>,
    pub similar_items_limit: usize,
}

impl AppState {
    /// Load every table and build the services on top of them.
    pub fn initialize(store: TableStore, similar_items_limit: usize) -> Result<Self> {
        let store = Arc::new(store);
        store.preload()?;

        let recommender = Arc::new(SimilarityRecommender::from_store(&store)?);
        // The recommender holds its own dense copy of the scores
        store.evict(TableName::SimilarityMatrix);
        let analytics = Arc::new(AnalyticsService::new(Arc::clone(&store)));

        info!(
            tables = store.loaded_count(),
            items = recommender.len(),
            "Application state initialized"
        );

        Ok(Self {
            store,
            analytics,
            recommender,
            similar_items_limit,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health_check))
        .route("/ready", web::get().to(readiness_check))
        .route(
            "/genre-playtime-leader/{genre}",
            web::get().to(genre_playtime_leader),
        )
        .route("/top-user-per-genre/{genre}", web::get().to(top_user_per_genre))
        .route(
            "/recommend-leaderboard/{year}",
            web::get().to(recommend_leaderboard),
        )
        .route("/worst-developer/{year}", web::get().to(worst_developer))
        .route(
            "/sentiment-summary/{developer}",
            web::get().to(sentiment_summary),
        )
        .route("/similar-items/{item_id}", web::get().to(similar_items));
}

async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME
    }))
}

async fn readiness_check(state: web::Data<AppState>) -> HttpResponse {
    // The matrix lives in the recommender once the state is built
    let missing: Vec<&str> = TableName::ALL
        .iter()
        .filter(|name| **name != TableName::SimilarityMatrix)
        .filter(|name| !state.store.is_loaded(**name))
        .map(|name| name.as_str())
        .collect();

    if missing.is_empty() {
        HttpResponse::Ok().json(serde_json::json!({
            "status": "ready",
            "tables": state.store.loaded_count(),
            "items": state.recommender.len()
        }))
    } else {
        HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "loading",
            "missing": missing
        }))
    }
}

/// Get the release year with the most playtime for a genre
pub async fn genre_playtime_leader(
    state: web::Data<AppState>,
    genre: web::Path<String>,
) -> Result<HttpResponse> {
    let genre = genre.into_inner();
    let analytics = Arc::clone(&state.analytics);
    let outcome = web::block(move || analytics.genre_playtime_leader(&genre)).await??;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Get the heaviest player of a genre and their hours per year
pub async fn top_user_per_genre(
    state: web::Data<AppState>,
    genre: web::Path<String>,
) -> Result<HttpResponse> {
    let genre = genre.into_inner();
    let analytics = Arc::clone(&state.analytics);
    let outcome = web::block(move || analytics.top_user_for_genre(&genre)).await??;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Get the three most recommended games of a year
pub async fn recommend_leaderboard(
    state: web::Data<AppState>,
    year: web::Path<String>,
) -> Result<HttpResponse> {
    let year = parse_int(&year, "year")?;
    let analytics = Arc::clone(&state.analytics);
    let outcome = web::block(move || analytics.recommend_leaderboard(year)).await??;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Get the three least recommended developers of a year
pub async fn worst_developer(
    state: web::Data<AppState>,
    year: web::Path<String>,
) -> Result<HttpResponse> {
    let year = parse_int(&year, "year")?;
    let analytics = Arc::clone(&state.analytics);
    let outcome = web::block(move || analytics.worst_developer_leaderboard(year)).await??;
    Ok(HttpResponse::Ok().json(outcome))
}

/// Get review sentiment counts for a developer
pub async fn sentiment_summary(
    state: web::Data<AppState>,
    developer: web::Path<String>,
) -> Result<HttpResponse> {
    let developer = developer.into_inner();
    let analytics = Arc::clone(&state.analytics);
    let summary = web::block(move || analytics.sentiment_summary(&developer)).await??;
    Ok(HttpResponse::Ok().json(summary))
}

/// Get the games most similar to a game
pub async fn similar_items(
    state: web::Data<AppState>,
    item_id: web::Path<String>,
) -> Result<HttpResponse> {
    let item_id = parse_int(&item_id, "item_id")?;
    let outcome = state
        .recommender
        .recommend(item_id, state.similar_items_limit);
    debug!(item_id, found = outcome.is_found(), "similar items");
    Ok(HttpResponse::Ok().json(outcome))
}

fn parse_int(raw: &str, name: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {}: '{}'", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("2015", "year").unwrap(), 2015);
        assert_eq!(parse_int(" 70 ", "item_id").unwrap(), 70);
        assert!(matches!(
            parse_int("twenty", "year"),
            Err(AppError::BadRequest(_))
        ));
    }
}
