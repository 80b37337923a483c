use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub fn load() -> Result<Config> {
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = match std::env::var("PORT") {
        Ok(port) => port.parse().context("PORT must be a valid port number")?,
        Err(_) => 3000,
    };

    Ok(Config {
        database: DatabaseConfig { url },
        server: ServerConfig { host, port },
    })
}
