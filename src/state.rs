use std::sync::Arc;

use anyhow::Context;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::config::AppConfig;
use crate::extractor::{GeminiExtractor, IntentExtractor};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub extractor: Arc<dyn IntentExtractor>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let extractor =
            Arc::new(GeminiExtractor::new(&config.gemini)) as Arc<dyn IntentExtractor>;

        Ok(Self {
            db,
            config,
            extractor,
        })
    }
}
