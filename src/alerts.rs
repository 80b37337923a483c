use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::IngredientEntity;

/// Ingredients expiring within this many days join the alert feed.
pub const EXPIRY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertLevel {
    Critical,
    Low,
    Expiring,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Critical => "Critical",
            AlertLevel::Low => "Low",
            AlertLevel::Expiring => "Expiring",
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct StockAlert {
    pub alert_type: String,
    pub ingredient: IngredientEntity,
}

/// Classifies one ingredient. Stock severity wins over expiry: an
/// ingredient both low and expiring reports its stock level.
pub fn classify(ingredient: &IngredientEntity, today: NaiveDate) -> Option<AlertLevel> {
    if ingredient.current_stock <= ingredient.minimum_stock {
        return Some(AlertLevel::Critical);
    }

    let low_threshold = &ingredient.minimum_stock * BigDecimal::from(3) / BigDecimal::from(2);
    if ingredient.current_stock <= low_threshold {
        return Some(AlertLevel::Low);
    }

    if let Some(expiry) = ingredient.expiry_date {
        if (expiry - today).num_days() <= EXPIRY_WINDOW_DAYS {
            return Some(AlertLevel::Expiring);
        }
    }

    None
}

/// Builds the combined alert feed: one entry per alerting ingredient,
/// ordered by severity then name.
pub fn build_feed(ingredients: Vec<IngredientEntity>, today: NaiveDate) -> Vec<StockAlert> {
    let mut alerts: Vec<(AlertLevel, IngredientEntity)> = ingredients
        .into_iter()
        .filter_map(|ingredient| {
            classify(&ingredient, today).map(|level| (level, ingredient))
        })
        .collect();

    alerts.sort_by(|(a_level, a), (b_level, b)| a_level.cmp(b_level).then_with(|| a.name.cmp(&b.name)));

    alerts
        .into_iter()
        .map(|(level, ingredient)| StockAlert {
            alert_type: level.as_str().to_string(),
            ingredient,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn ingredient(
        name: &str,
        current: i32,
        minimum: i32,
        expiry: Option<NaiveDate>,
    ) -> IngredientEntity {
        IngredientEntity {
            id: 1,
            name: name.to_string(),
            unit: "kg".to_string(),
            current_stock: BigDecimal::from(current),
            minimum_stock: BigDecimal::from(minimum),
            price_per_unit: BigDecimal::from(2),
            supplier: None,
            last_purchase_date: None,
            expiry_date: expiry,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(year: i32, month: u32, dayno: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, dayno).unwrap()
    }

    #[test]
    fn stock_at_or_below_minimum_is_critical() {
        let today = day(2025, 6, 1);
        assert_eq!(
            classify(&ingredient("Flour", 5, 10, None), today),
            Some(AlertLevel::Critical)
        );
        assert_eq!(
            classify(&ingredient("Salt", 10, 10, None), today),
            Some(AlertLevel::Critical)
        );
    }

    #[test]
    fn stock_within_half_band_is_low() {
        let today = day(2025, 6, 1);
        assert_eq!(
            classify(&ingredient("Rice", 15, 10, None), today),
            Some(AlertLevel::Low)
        );
        assert_eq!(classify(&ingredient("Oil", 16, 10, None), today), None);
    }

    #[test]
    fn expiry_inside_window_alerts() {
        let today = day(2025, 6, 1);
        let soon = ingredient("Milk", 100, 10, Some(day(2025, 6, 8)));
        let later = ingredient("Beans", 100, 10, Some(day(2025, 6, 9)));
        let past = ingredient("Yogurt", 100, 10, Some(day(2025, 5, 30)));

        assert_eq!(classify(&soon, today), Some(AlertLevel::Expiring));
        assert_eq!(classify(&later, today), None);
        assert_eq!(classify(&past, today), Some(AlertLevel::Expiring));
    }

    #[test]
    fn stock_severity_wins_over_expiry() {
        let today = day(2025, 6, 1);
        let both = ingredient("Butter", 5, 10, Some(day(2025, 6, 2)));
        assert_eq!(classify(&both, today), Some(AlertLevel::Critical));
    }

    #[test]
    fn feed_orders_by_severity_then_name() {
        let today = day(2025, 6, 1);
        let feed = build_feed(
            vec![
                ingredient("Rice", 15, 10, None),
                ingredient("Flour", 5, 10, None),
                ingredient("Milk", 100, 10, Some(day(2025, 6, 3))),
                ingredient("Apples", 2, 10, None),
                ingredient("Oil", 100, 10, None),
            ],
            today,
        );

        let summary: Vec<(&str, &str)> = feed
            .iter()
            .map(|alert| (alert.alert_type.as_str(), alert.ingredient.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Critical", "Apples"),
                ("Critical", "Flour"),
                ("Low", "Rice"),
                ("Expiring", "Milk"),
            ]
        );
    }
}
