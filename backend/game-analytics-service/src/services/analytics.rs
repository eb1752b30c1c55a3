//! Analytics queries over the playtime and review tables
use std::sync::Arc;
use tracing::debug;

use super::aggregation::{self, Order, Predicate};
use crate::error::{AppError, Result};
use crate::models::{
    GenrePlaytimeLeader, Leaderboard, QueryOutcome, Scalar, SentimentSummary, TopUserForGenre,
    YearHours,
};
use crate::store::{TableName, TableStore};

/// Placeholder the ETL writes for reviews without a game title
pub const UNSPECIFIED_TITLE: &str = "No especificado";

/// Placeholder the ETL writes for reviews without a developer
pub const UNSPECIFIED_DEVELOPER: &str = "Otro";

pub const LEADERBOARD_SIZE: usize = 3;

const SENTIMENT_NEGATIVE: i64 = 0;
const SENTIMENT_NEUTRAL: i64 = 1;
const SENTIMENT_POSITIVE: i64 = 2;

const INSUFFICIENT_DATA: &str = "Not enough data to build the top 3";

pub struct AnalyticsService {
    store: Arc<TableStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<TableStore>) -> Self {
        Self { store }
    }

    /// Release year of the single row with the most playtime for `genre`.
    ///
    /// Works on raw minutes; the unit does not matter for picking the maximum.
    pub fn genre_playtime_leader(&self, genre: &str) -> Result<QueryOutcome<GenrePlaytimeLeader>> {
        let table = self.store.load(TableName::GenrePlaytime)?;
        let rows = aggregation::filter(&table, &Predicate::new().equals("genres", genre))?;

        let leader = match aggregation::argmax(&rows, "playtime") {
            Ok(row) => row,
            Err(e) => return recover(e, format!("No playtime data for genre {}", genre)),
        };

        let release_year = leader
            .get("release_year")
            .map(Scalar::normalized)
            .unwrap_or(Scalar::Null);

        debug!(genre, release_year = %release_year, candidates = rows.len(), "genre playtime leader");
        Ok(QueryOutcome::Found(GenrePlaytimeLeader {
            genre: genre.to_string(),
            release_year,
        }))
    }

    /// User with the largest single playtime row for `genre`, with that
    /// user's hours summed per release year (ascending by year).
    pub fn top_user_for_genre(&self, genre: &str) -> Result<QueryOutcome<TopUserForGenre>> {
        let table = self.store.load(TableName::UserGenrePlaytime)?;
        let rows = aggregation::filter(&table, &Predicate::new().equals("genres", genre))?;
        let rows = aggregation::map_numeric(&rows, "playtime", aggregation::minutes_to_hours)?;

        let user_id = match aggregation::argmax(&rows, "playtime") {
            Ok(row) => row.get("user_id").cloned().unwrap_or(Scalar::Null),
            Err(e) => return recover(e, format!("No playtime data for genre {}", genre)),
        };

        let user_rows = aggregation::filter(&rows, &Predicate::new().equals("user_id", user_id.clone()))?;
        let mut hours_played: Vec<YearHours> = aggregation::group_sum(&user_rows, "release_year", "playtime")?
            .into_entries()
            .into_iter()
            .filter_map(|(year, hours)| year.as_i64().map(|year| YearHours { year, hours }))
            .collect();
        hours_played.sort_by_key(|entry| entry.year);

        debug!(genre, user_id = %user_id, years = hours_played.len(), "top user for genre");
        Ok(QueryOutcome::Found(TopUserForGenre {
            genre: genre.to_string(),
            user_id,
            hours_played,
        }))
    }

    /// Three most recommended titles among positive/neutral reviews of `year`.
    pub fn recommend_leaderboard(&self, year: i64) -> Result<QueryOutcome<Leaderboard>> {
        let predicate = Predicate::new()
            .equals("posted_year", year)
            .equals("recommend", true)
            .one_of("sentiment_analysis", [SENTIMENT_POSITIVE, SENTIMENT_NEUTRAL])
            .not_equals("title", UNSPECIFIED_TITLE);
        self.leaderboard(year, &predicate, "title", Order::Max)
    }

    /// Three developers with the fewest recommendations among negative,
    /// not-recommended reviews of `year`.
    pub fn worst_developer_leaderboard(&self, year: i64) -> Result<QueryOutcome<Leaderboard>> {
        let predicate = Predicate::new()
            .equals("posted_year", year)
            .equals("recommend", false)
            .equals("sentiment_analysis", SENTIMENT_NEGATIVE)
            .not_equals("developer", UNSPECIFIED_DEVELOPER);
        self.leaderboard(year, &predicate, "developer", Order::Min)
    }

    fn leaderboard(
        &self,
        year: i64,
        predicate: &Predicate,
        group_col: &str,
        order: Order,
    ) -> Result<QueryOutcome<Leaderboard>> {
        let table = self.store.load(TableName::Reviews)?;
        let rows = aggregation::filter(&table, predicate)?;
        let totals = aggregation::group_sum(&rows, group_col, "recommend")?;
        let ranked = aggregation::top_k(&totals, LEADERBOARD_SIZE, order);

        debug!(year, group_col, groups = totals.len(), "leaderboard");

        if ranked.len() < LEADERBOARD_SIZE {
            return recover(
                AppError::InsufficientResults(format!(
                    "{} distinct {} values for {}",
                    ranked.len(),
                    group_col,
                    year
                )),
                INSUFFICIENT_DATA.to_string(),
            );
        }

        Ok(QueryOutcome::Found(Leaderboard {
            entries: ranked.into_iter().map(|(key, _)| key.to_string()).collect(),
        }))
    }

    /// Review counts per sentiment class for an exact developer name.
    pub fn sentiment_summary(&self, developer: &str) -> Result<SentimentSummary> {
        let table = self.store.load(TableName::Reviews)?;
        let rows = aggregation::filter(&table, &Predicate::new().equals("developer", developer))?;
        let counts = aggregation::value_counts(&rows, "sentiment_analysis")?;

        let count_of = |class: i64| {
            counts
                .iter()
                .find(|(value, _)| value.matches(&Scalar::Int(class)))
                .map(|(_, n)| *n)
                .unwrap_or(0)
        };

        Ok(SentimentSummary {
            developer: developer.to_string(),
            negative: count_of(SENTIMENT_NEGATIVE),
            neutral: count_of(SENTIMENT_NEUTRAL),
            positive: count_of(SENTIMENT_POSITIVE),
        })
    }
}

/// Turn a recoverable failure into a descriptive payload; pass the rest up.
fn recover<T>(err: AppError, message: String) -> Result<QueryOutcome<T>> {
    if err.is_recoverable() {
        debug!(error = %err, "query fell back to descriptive payload");
        Ok(QueryOutcome::Fallback(message))
    } else {
        Err(err)
    }
}
