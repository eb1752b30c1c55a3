use anyhow::{anyhow, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // HTTP server config
    pub http_host: String,
    pub http_port: u16,
    /// 0 keeps the actix default (one worker per core)
    pub http_workers: usize,

    // Datasets, relative to data_dir
    pub data_dir: String,
    pub genre_playtime_source: String,
    pub user_genre_playtime_source: String,
    pub reviews_source: String,
    pub similarity_matrix_source: String,
    pub item_index_source: String,
    pub item_catalog_source: String,

    // Recommender
    pub similar_items_limit: usize,

    // Observability
    pub log_level: String,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let config = config::Config::builder()
            .set_default("http_host", "0.0.0.0")?
            .set_default("http_port", 8000)?
            .set_default("http_workers", 0)?
            .set_default("data_dir", "Data")?
            .set_default("genre_playtime_source", "endpoint_1")?
            .set_default("user_genre_playtime_source", "endpoint_2")?
            .set_default("reviews_source", "df_australian_user_reviews")?
            .set_default("similarity_matrix_source", "similitud_del_coseno")?
            .set_default("item_index_source", "indices_modelo")?
            .set_default("item_catalog_source", "filtrado_modelo")?
            .set_default("similar_items_limit", 5)?
            .set_default("log_level", "info,actix_web=info")?
            .set_default("log_format", "pretty")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(anyhow!("HTTP port must be greater than 0"));
        }

        if self.data_dir.is_empty() {
            return Err(anyhow!("Data directory is required"));
        }

        let sources = [
            ("genre_playtime_source", &self.genre_playtime_source),
            ("user_genre_playtime_source", &self.user_genre_playtime_source),
            ("reviews_source", &self.reviews_source),
            ("similarity_matrix_source", &self.similarity_matrix_source),
            ("item_index_source", &self.item_index_source),
            ("item_catalog_source", &self.item_catalog_source),
        ];
        if let Some((key, _)) = sources.iter().find(|(_, value)| value.is_empty()) {
            return Err(anyhow!("{} must not be empty", key));
        }

        if self.similar_items_limit == 0 || self.similar_items_limit > 50 {
            return Err(anyhow!("Similar items limit must be between 1 and 50"));
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(anyhow!(
                "Log format must be 'json' or 'pretty', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }
}
