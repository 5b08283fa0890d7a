use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:meals.db?mode=rwc".into());
        let gemini = GeminiConfig {
            api_key: std::env::var("GOOGLE_API_KEY")
                .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY environment variable not set"))?,
            model: std::env::var("GEMINI_MODEL_NAME")
                .unwrap_or_else(|_| "gemini-1.5-flash".into()),
        };
        Ok(Self {
            database_url,
            gemini,
        })
    }
}
