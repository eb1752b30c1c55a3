//! Item-item similarity recommender
//!
//! The ETL ships three artifacts that line up by position: an item index
//! (`item_id` per row), a catalog (`item_name` per row) and a square score
//! matrix. They are joined once into [`Recommendable`] entries so lookups
//! never go through positional indirection at request time.
use ndarray::Array2;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::models::{QueryOutcome, Recommendation, Scalar, Table};
use crate::store::{TableName, TableStore};

/// One item that can be recommended
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendable {
    pub id: Scalar,
    pub name: String,
    pub similarity_row_index: usize,
}

pub struct SimilarityRecommender {
    items: Vec<Recommendable>,
    by_id: HashMap<i64, usize>,
    scores: Array2<f64>,
}

impl SimilarityRecommender {
    /// Join the index, catalog and matrix tables from the store.
    pub fn from_store(store: &TableStore) -> Result<Self> {
        let index = store.load(TableName::ItemIndex)?;
        let catalog = store.load(TableName::ItemCatalog)?;
        let matrix = store.load(TableName::SimilarityMatrix)?;
        Self::from_tables(&index, &catalog, &matrix)
    }

    pub fn from_tables(index: &Table, catalog: &Table, matrix: &Table) -> Result<Self> {
        let n = index.len();
        if catalog.len() != n || matrix.len() != n || matrix.columns().len() != n {
            return Err(AppError::SchemaMismatch(format!(
                "similarity artifacts are misaligned: index={} catalog={} matrix={}x{}",
                n,
                catalog.len(),
                matrix.len(),
                matrix.columns().len()
            )));
        }

        let mut scores = Array2::<f64>::zeros((n, n));
        for (i, row) in matrix.raw_rows().iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                scores[[i, j]] = match value {
                    Scalar::Null => f64::NAN,
                    other => other.as_f64().ok_or_else(|| {
                        AppError::SchemaMismatch(format!(
                            "similarity matrix cell ({}, {}) is not numeric: {:?}",
                            i, j, other
                        ))
                    })?,
                };
            }
        }

        let ids = index.column_values("item_id")?;
        let names = catalog.column_values("item_name")?;

        let mut items = Vec::with_capacity(n);
        let mut by_id = HashMap::with_capacity(n);
        for (pos, (id, name)) in ids.zip(names).enumerate() {
            // Duplicate ids resolve to their first position
            if let Some(key) = id.as_i64() {
                by_id.entry(key).or_insert(pos);
            }
            items.push(Recommendable {
                id: id.normalized(),
                name: name.to_string(),
                similarity_row_index: pos,
            });
        }

        if by_id.len() < n {
            warn!(
                items = n,
                unique_ids = by_id.len(),
                "item index contains duplicate or non-integer ids"
            );
        }
        info!(items = n, "Similarity recommender ready");

        Ok(Self {
            items,
            by_id,
            scores,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn lookup(&self, item_id: i64) -> Option<&Recommendable> {
        self.by_id.get(&item_id).map(|&pos| &self.items[pos])
    }

    /// Up to `k` items most similar to `item_id`, best first.
    pub fn recommend(&self, item_id: i64, k: usize) -> QueryOutcome<Vec<Recommendation>> {
        match self.neighbors(item_id, k) {
            Ok(found) => QueryOutcome::Found(found),
            Err(e) => {
                debug!(item_id, error = %e, "no recommendations");
                QueryOutcome::Fallback(format!("Item ID {} is not in the item index", item_id))
            }
        }
    }

    /// Ranked neighbors of `item_id`, `UnknownItem` if the id is not indexed.
    pub fn neighbors(&self, item_id: i64, k: usize) -> Result<Vec<Recommendation>> {
        let item = self
            .lookup(item_id)
            .ok_or_else(|| AppError::UnknownItem(format!("item {} not indexed", item_id)))?;
        let own = item.similarity_row_index;

        let mut ranked: Vec<(usize, f64)> = self
            .scores
            .row(own)
            .iter()
            .copied()
            .enumerate()
            .filter(|(pos, _)| *pos != own)
            .map(|(pos, score)| (pos, rank_score(score)))
            .collect();

        // Higher score first; equal scores by lower position
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(rank, (pos, score))| {
                let neighbor = &self.items[pos];
                Recommendation {
                    rank: rank + 1,
                    item_id: neighbor.id.clone(),
                    item_name: neighbor.name.clone(),
                    score,
                }
            })
            .collect())
    }
}

/// Missing scores rank last; `-0.0` ranks level with `0.0`.
fn rank_score(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else if score == 0.0 {
        0.0
    } else {
        score
    }
}
