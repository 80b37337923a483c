use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::config::Config;
use crate::core::db::{self, DbPool};

const HTTP_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub async fn init(config: &Config) -> Result<Self> {
        let db_pool = db::build_pool(&config.database.url).await?;
        let http_client = reqwest::Client::builder()
            .timeout(HTTP_CLIENT_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            db_pool,
            http_client,
        })
    }
}
