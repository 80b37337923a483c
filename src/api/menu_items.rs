use std::collections::HashMap;

use anyhow::Context;
use bigdecimal::BigDecimal;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::api::ApiUrls;
use crate::core::app_error::AppError;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MenuItem {
    pub id: i32,
    pub name: String,
    pub price: BigDecimal,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl MenuItem {
    pub fn is_unavailable(&self) -> bool {
        self.is_available == Some(false)
    }
}

/// Fetches the menu from the menu service and keys it by item id. Used to
/// resolve display names and to seed `unit_price` snapshots at order time.
pub async fn get_menu_items(client: Client) -> Result<HashMap<i32, MenuItem>, AppError> {
    let url = ApiUrls::get_menu_service_url();
    let menu_items: Vec<MenuItem> = client
        .get(format!("{}/menu_items", url))
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("MenuService".into()))?
        .json()
        .await
        .context("Failed to parse menu items JSON")?;

    Ok(menu_items.into_iter().map(|item| (item.id, item)).collect())
}
