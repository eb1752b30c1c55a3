//! Query payloads
//!
//! Each payload keeps typed fields and controls its own wire shape, so the
//! JSON clients see stays stable regardless of how results are computed.
pub mod table;

pub use table::{Row, Scalar, Table};

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Result of a query: a typed payload, or a human-readable explanation of
/// why there is nothing to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryOutcome<T> {
    Found(T),
    Fallback(String),
}

impl<T> QueryOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, QueryOutcome::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            QueryOutcome::Found(value) => Some(value),
            QueryOutcome::Fallback(_) => None,
        }
    }
}

/// Release year holding the single largest playtime row of a genre
#[derive(Debug, Clone, PartialEq)]
pub struct GenrePlaytimeLeader {
    pub genre: String,
    pub release_year: Scalar,
}

impl Serialize for GenrePlaytimeLeader {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &format!("Release year with most hours played for {}", self.genre),
            &self.release_year,
        )?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearHours {
    pub year: i64,
    pub hours: f64,
}

/// Heaviest player of a genre and their hours per release year
#[derive(Debug, Clone, PartialEq)]
pub struct TopUserForGenre {
    pub genre: String,
    pub user_id: Scalar,
    pub hours_played: Vec<YearHours>,
}

impl Serialize for TopUserForGenre {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(
            &format!("User with most hours played for {}", self.genre),
            &self.user_id,
        )?;
        map.serialize_entry("hours_played", &self.hours_played)?;
        map.end()
    }
}

/// Ranked names, serialized as `[{"rank 1": name}, {"rank 2": name}, ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct Leaderboard {
    pub entries: Vec<String>,
}

struct RankEntry<'a>(usize, &'a str);

impl Serialize for RankEntry<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&format!("rank {}", self.0), self.1)?;
        map.end()
    }
}

impl Serialize for Leaderboard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (idx, name) in self.entries.iter().enumerate() {
            seq.serialize_element(&RankEntry(idx + 1, name))?;
        }
        seq.end()
    }
}

/// Review counts per sentiment class for one developer
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentSummary {
    pub developer: String,
    pub negative: usize,
    pub neutral: usize,
    pub positive: usize,
}

impl SentimentSummary {
    pub fn total(&self) -> usize {
        self.negative + self.neutral + self.positive
    }
}

impl Serialize for SentimentSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let counts = [
            format!("Negative = {}", self.negative),
            format!("Neutral = {}", self.neutral),
            format!("Positive = {}", self.positive),
        ];
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.developer, &counts)?;
        map.end()
    }
}

/// One similar item, serialized as `"Recommendation <rank>: <name>"`
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub rank: usize,
    pub item_id: Scalar,
    pub item_name: String,
    pub score: f64,
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("Recommendation {}: {}", self.rank, self.item_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_genre_leader_shape() {
        let payload = GenrePlaytimeLeader {
            genre: "Action".into(),
            release_year: Scalar::Int(2012),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"Release year with most hours played for Action": 2012})
        );
    }

    #[test]
    fn test_top_user_shape() {
        let payload = TopUserForGenre {
            genre: "RPG".into(),
            user_id: Scalar::Str("gamer".into()),
            hours_played: vec![YearHours { year: 2010, hours: 1.5 }],
        };
        assert_eq!(
            serde_json::to_string(&payload).unwrap(),
            r#"{"User with most hours played for RPG":"gamer","hours_played":[{"year":2010,"hours":1.5}]}"#
        );
    }

    #[test]
    fn test_leaderboard_shape() {
        let board = Leaderboard {
            entries: vec!["A".into(), "B".into(), "C".into()],
        };
        assert_eq!(
            serde_json::to_value(&board).unwrap(),
            json!([{"rank 1": "A"}, {"rank 2": "B"}, {"rank 3": "C"}])
        );
    }

    #[test]
    fn test_sentiment_shape() {
        let summary = SentimentSummary {
            developer: "Valve".into(),
            negative: 0,
            neutral: 2,
            positive: 5,
        };
        assert_eq!(summary.total(), 7);
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({"Valve": ["Negative = 0", "Neutral = 2", "Positive = 5"]})
        );
    }

    #[test]
    fn test_outcome_untagged() {
        let fallback: QueryOutcome<Leaderboard> = QueryOutcome::Fallback("nothing".into());
        assert_eq!(serde_json::to_string(&fallback).unwrap(), r#""nothing""#);

        let found = QueryOutcome::Found(vec![Recommendation {
            rank: 1,
            item_id: Scalar::Int(10),
            item_name: "Portal".into(),
            score: 0.9,
        }]);
        assert_eq!(
            serde_json::to_string(&found).unwrap(),
            r#"["Recommendation 1: Portal"]"#
        );
    }
}
