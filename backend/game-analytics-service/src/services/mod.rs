//! Query services
//!
//! - `aggregation`: filter / group / rank primitives over tables
//! - `analytics`: playtime and review queries built on those primitives
//! - `similarity`: item-item nearest neighbor lookups

pub mod aggregation;
pub mod analytics;
pub mod similarity;

pub use aggregation::{Order, Predicate};
pub use analytics::AnalyticsService;
pub use similarity::{Recommendable, SimilarityRecommender};
