//! Table store
//!
//! Binds every logical dataset to a location on disk, decodes it on first use
//! and keeps it resident for the lifetime of the process. Datasets are never
//! re-read once loaded.

pub mod reader;

use dashmap::DashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::Table;

/// Datasets the service queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableName {
    /// Per-game playtime (minutes) with genre and release year
    GenrePlaytime,
    /// Per-user, per-game playtime (minutes) with genre and release year
    UserGenrePlaytime,
    /// User reviews with sentiment labels
    Reviews,
    SimilarityMatrix,
    ItemIndex,
    ItemCatalog,
}

impl TableName {
    pub const ALL: [TableName; 6] = [
        TableName::GenrePlaytime,
        TableName::UserGenrePlaytime,
        TableName::Reviews,
        TableName::SimilarityMatrix,
        TableName::ItemIndex,
        TableName::ItemCatalog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TableName::GenrePlaytime => "genre_playtime",
            TableName::UserGenrePlaytime => "user_genre_playtime",
            TableName::Reviews => "reviews",
            TableName::SimilarityMatrix => "similarity_matrix",
            TableName::ItemIndex => "item_index",
            TableName::ItemCatalog => "item_catalog",
        }
    }

    /// Columns that must be present for the queries over this table
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            TableName::GenrePlaytime => &["genres", "release_year", "playtime"],
            TableName::UserGenrePlaytime => &["genres", "user_id", "release_year", "playtime"],
            TableName::Reviews => &[
                "posted_year",
                "recommend",
                "sentiment_analysis",
                "title",
                "developer",
            ],
            TableName::SimilarityMatrix => &[],
            TableName::ItemIndex => &["item_id"],
            TableName::ItemCatalog => &["item_name"],
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location of every dataset
#[derive(Debug, Clone)]
pub struct TableSources {
    pub genre_playtime: PathBuf,
    pub user_genre_playtime: PathBuf,
    pub reviews: PathBuf,
    pub similarity_matrix: PathBuf,
    pub item_index: PathBuf,
    pub item_catalog: PathBuf,
}

impl TableSources {
    pub fn from_config(config: &Config) -> Self {
        let root = Path::new(&config.data_dir);
        Self {
            genre_playtime: root.join(&config.genre_playtime_source),
            user_genre_playtime: root.join(&config.user_genre_playtime_source),
            reviews: root.join(&config.reviews_source),
            similarity_matrix: root.join(&config.similarity_matrix_source),
            item_index: root.join(&config.item_index_source),
            item_catalog: root.join(&config.item_catalog_source),
        }
    }

    pub fn path(&self, name: TableName) -> &Path {
        match name {
            TableName::GenrePlaytime => &self.genre_playtime,
            TableName::UserGenrePlaytime => &self.user_genre_playtime,
            TableName::Reviews => &self.reviews,
            TableName::SimilarityMatrix => &self.similarity_matrix,
            TableName::ItemIndex => &self.item_index,
            TableName::ItemCatalog => &self.item_catalog,
        }
    }
}

pub struct TableStore {
    sources: TableSources,
    tables: DashMap<TableName, Arc<Table>>,
}

impl TableStore {
    pub fn new(sources: TableSources) -> Self {
        Self {
            sources,
            tables: DashMap::new(),
        }
    }

    /// Load a dataset, decoding it from storage only the first time.
    pub fn load(&self, name: TableName) -> Result<Arc<Table>> {
        if let Some(table) = self.tables.get(&name) {
            return Ok(Arc::clone(table.value()));
        }
        debug!(table = %name, "table not resident, reading from storage");

        let path = self.sources.path(name);
        let started = Instant::now();
        let table = reader::read_table(path).map_err(|e| scoped(name, e))?;
        table
            .require_columns(name.required_columns())
            .map_err(|e| scoped(name, e))?;

        info!(
            table = %name,
            path = %path.display(),
            rows = table.len(),
            columns = table.columns().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Table loaded"
        );

        // Two racing first loads decode twice; the first insert wins.
        let table = self
            .tables
            .entry(name)
            .or_insert_with(|| Arc::new(table))
            .clone();
        Ok(table)
    }

    /// Load every dataset so requests never touch storage.
    pub fn preload(&self) -> Result<()> {
        for name in TableName::ALL {
            self.load(name)?;
        }
        Ok(())
    }

    /// Drop a resident table, returning it if it was loaded. A later `load`
    /// reads it from storage again.
    pub fn evict(&self, name: TableName) -> Option<Arc<Table>> {
        let evicted = self.tables.remove(&name).map(|(_, table)| table);
        if evicted.is_some() {
            debug!(table = %name, "table evicted");
        }
        evicted
    }

    pub fn loaded_count(&self) -> usize {
        self.tables.len()
    }

    pub fn is_loaded(&self, name: TableName) -> bool {
        self.tables.contains_key(&name)
    }
}

fn scoped(name: TableName, err: AppError) -> AppError {
    match err {
        AppError::SchemaMismatch(msg) => AppError::SchemaMismatch(format!("table {}: {}", name, msg)),
        AppError::DataUnavailable(msg) => {
            AppError::DataUnavailable(format!("table {}: {}", name, msg))
        }
        other => other,
    }
}
