use std::collections::HashMap;

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::api::ApiUrls;
use crate::core::app_error::AppError;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiningTable {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: Option<String>,
}

/// The table service only exposes a full listing, so lookups fetch it and
/// key by id.
pub async fn get_tables(client: Client) -> Result<HashMap<i32, DiningTable>, AppError> {
    let url = ApiUrls::get_table_service_url();
    let tables: Vec<DiningTable> = client
        .get(format!("{}/tables", url))
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("TableService".into()))?
        .json()
        .await
        .context("Failed to parse tables JSON")?;

    Ok(tables.into_iter().map(|table| (table.id, table)).collect())
}

pub async fn get_table(client: Client, id: i32) -> Result<Option<DiningTable>, AppError> {
    let mut tables = get_tables(client).await?;
    Ok(tables.remove(&id))
}
