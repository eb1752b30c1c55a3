use actix_web::{http::StatusCode, test, web, App};
use arrow_array::{ArrayRef, Float64Array, RecordBatch};
use parquet::arrow::ArrowWriter;
use serde_json::{json, Value};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use game_analytics_service::handlers::{self, AppState};
use game_analytics_service::store::{TableName, TableSources, TableStore};

const GENRE_PLAYTIME: &str = "\
genres,release_year,playtime
Action,2010,300
Action,2012,900
Indie,2016,40
";

const USER_GENRE_PLAYTIME: &str = "\
genres,user_id,release_year,playtime
Action,76561197970982479,2012,1200
Action,js41637,2010,60
Action,76561197970982479,2010,30
Indie,doctr,2016,90
";

const REVIEWS: &str = "\
posted_year,recommend,sentiment_analysis,title,developer
2013,True,2,Portal 2,Valve
2013,True,1,Terraria,Re-Logic
2013,True,2,Terraria,Re-Logic
2013,True,2,Limbo,Playdead
2013,False,0,Rust,Facepunch
2013,False,0,Spore,Maxis
2013,False,0,Arma 2,Bohemia
2014,True,2,Portal 2,Valve
2014,True,2,No especificado,Otro
2014,True,2,Terraria,Re-Logic
";

const ITEM_INDEX: &str = "\
,item_id
0,10
1,20
2,30
3,40
";

const ITEM_CATALOG: &str = "\
item_name
Counter-Strike
Team Fortress Classic
Day of Defeat
Deathmatch Classic
";

/// Symmetric 4x4 similarity matrix with a tie between items 1 and 3
fn write_matrix(path: &Path) {
    let columns: [[f64; 4]; 4] = [
        [1.0, 0.4, 0.8, 0.4],
        [0.4, 1.0, 0.3, 0.9],
        [0.8, 0.3, 1.0, 0.2],
        [0.4, 0.9, 0.2, 1.0],
    ];
    let batch = RecordBatch::try_from_iter(columns.iter().enumerate().map(|(i, col)| {
        (
            i.to_string(),
            Arc::new(Float64Array::from(col.to_vec())) as ArrayRef,
        )
    }))
    .unwrap();

    let file = File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
}

fn fixture() -> (TempDir, TableSources) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("endpoint_1"), GENRE_PLAYTIME).unwrap();
    fs::write(root.join("endpoint_2"), USER_GENRE_PLAYTIME).unwrap();
    fs::write(root.join("reviews"), REVIEWS).unwrap();
    fs::write(root.join("indices_modelo"), ITEM_INDEX).unwrap();
    fs::write(root.join("filtrado_modelo"), ITEM_CATALOG).unwrap();
    write_matrix(&root.join("similitud_del_coseno"));

    let sources = TableSources {
        genre_playtime: root.join("endpoint_1"),
        user_genre_playtime: root.join("endpoint_2"),
        reviews: root.join("reviews"),
        similarity_matrix: root.join("similitud_del_coseno"),
        item_index: root.join("indices_modelo"),
        item_catalog: root.join("filtrado_modelo"),
    };
    (dir, sources)
}

fn state() -> (TempDir, AppState) {
    let (dir, sources) = fixture();
    let state = AppState::initialize(TableStore::new(sources), 5).expect("state");
    (dir, state)
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, Value) {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(handlers::configure),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[actix_web::test]
async fn health_reports_healthy() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn ready_after_preload() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ready", "tables": 5, "items": 4}));
}

#[::core::prelude::v1::test]
fn similarity_matrix_is_not_kept_resident() {
    let (_dir, state) = state();
    assert!(!state.store.is_loaded(TableName::SimilarityMatrix));
    assert!(state.store.is_loaded(TableName::ItemIndex));
    assert_eq!(state.recommender.len(), 4);
}

#[actix_web::test]
async fn genre_playtime_leader_returns_year() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/genre-playtime-leader/Action").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"Release year with most hours played for Action": 2012})
    );
}

#[actix_web::test]
async fn genre_playtime_leader_unknown_genre_is_descriptive() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/genre-playtime-leader/Puzzle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("No playtime data for genre Puzzle"));
}

#[actix_web::test]
async fn top_user_per_genre_lists_hours_by_year() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/top-user-per-genre/Action").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "User with most hours played for Action": "76561197970982479",
            "hours_played": [
                {"year": 2010, "hours": 0.5},
                {"year": 2012, "hours": 20.0}
            ]
        })
    );
}

#[actix_web::test]
async fn recommend_leaderboard_ranks_titles() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/recommend-leaderboard/2013").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"rank 1": "Terraria"}, {"rank 2": "Portal 2"}, {"rank 3": "Limbo"}])
    );
}

#[actix_web::test]
async fn recommend_leaderboard_with_two_titles_is_insufficient() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/recommend-leaderboard/2014").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Not enough data to build the top 3"));
}

#[actix_web::test]
async fn worst_developer_ranks_ascending() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/worst-developer/2013").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"rank 1": "Facepunch"}, {"rank 2": "Maxis"}, {"rank 3": "Bohemia"}])
    );
}

#[actix_web::test]
async fn invalid_year_is_bad_request() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/worst-developer/last-year").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[actix_web::test]
async fn sentiment_summary_includes_zero_counts() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/sentiment-summary/Re-Logic").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"Re-Logic": ["Negative = 0", "Neutral = 1", "Positive = 2"]})
    );
}

#[actix_web::test]
async fn similar_items_are_ranked_with_ties_by_position() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/similar-items/10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            "Recommendation 1: Day of Defeat",
            "Recommendation 2: Team Fortress Classic",
            "Recommendation 3: Deathmatch Classic"
        ])
    );
}

#[actix_web::test]
async fn similar_items_unknown_id_is_descriptive() {
    let (_dir, state) = state();
    let (status, body) = get_json(state, "/similar-items/999").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Item ID 999 is not in the item index"));
}

#[actix_web::test]
async fn repeated_queries_are_identical() {
    let (_dir, state) = state();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(handlers::configure),
    )
    .await;

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/top-user-per-genre/Action")
            .to_request();
        bodies.push(test::call_and_read_body(&app, req).await);
    }
    assert_eq!(bodies[0], bodies[1]);
}

#[::core::prelude::v1::test]
fn misaligned_similarity_artifacts_fail_at_startup() {
    let (dir, sources) = fixture();
    fs::write(dir.path().join("filtrado_modelo"), "item_name\nOnly One\n").unwrap();
    assert!(AppState::initialize(TableStore::new(sources), 5).is_err());
}
