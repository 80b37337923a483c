use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Orders

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub table_id: i32,
    pub status: String,
    pub payment_status: String,
    pub payment_method: Option<String>,
    #[schema(value_type = f64)]
    pub total_amount: BigDecimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub table_id: i32,
    pub status: String,
    pub payment_status: String,
    pub total_amount: BigDecimal,
    pub notes: Option<String>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub order_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    #[schema(value_type = f64)]
    pub unit_price: BigDecimal,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i32,
    pub menu_item_id: i32,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

// Ingredients

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::ingredients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IngredientEntity {
    pub id: i32,
    pub name: String,
    pub unit: String,
    #[schema(value_type = f64)]
    pub current_stock: BigDecimal,
    #[schema(value_type = f64)]
    pub minimum_stock: BigDecimal,
    #[schema(value_type = f64)]
    pub price_per_unit: BigDecimal,
    pub supplier: Option<String>,
    pub last_purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::ingredients)]
pub struct CreateIngredientEntity {
    pub name: String,
    pub unit: String,
    pub current_stock: BigDecimal,
    pub minimum_stock: BigDecimal,
    pub price_per_unit: BigDecimal,
    pub supplier: Option<String>,
    pub last_purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Queryable, Selectable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::inventory_transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct InventoryTransactionEntity {
    pub id: Uuid,
    pub ingredient_id: i32,
    pub transaction_type: String,
    #[schema(value_type = f64)]
    pub quantity: BigDecimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::inventory_transactions)]
pub struct CreateInventoryTransactionEntity {
    pub ingredient_id: i32,
    pub transaction_type: String,
    pub quantity: BigDecimal,
    pub notes: Option<String>,
}

/// Preparation state of an order. Stored as text; parsed at the API
/// boundary so illegal values and illegal jumps are rejected there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Preparing,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Ready => "Ready",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Reachability table. Same-status transitions are handled by callers
    /// as idempotent no-ops and never reach this check.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match self {
            OrderStatus::Preparing => {
                matches!(next, OrderStatus::Ready | OrderStatus::Cancelled)
            }
            OrderStatus::Ready => matches!(next, OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Preparing" => Ok(OrderStatus::Preparing),
            "Ready" => Ok(OrderStatus::Ready),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Paid => "Paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unpaid" => Ok(PaymentStatus::Unpaid),
            "Paid" => Ok(PaymentStatus::Paid),
            _ => Err(()),
        }
    }
}

/// Kind of ledger movement. Quantities are always positive magnitudes;
/// the type alone decides the sign applied to the stock balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Purchase,
    Consumption,
    Adjustment,
    Waste,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Purchase => "Purchase",
            TransactionType::Consumption => "Consumption",
            TransactionType::Adjustment => "Adjustment",
            TransactionType::Waste => "Waste",
        }
    }

    /// Purchase and Adjustment credit the balance; Consumption and Waste
    /// debit it. Downward corrections are recorded as Waste.
    pub fn is_credit(self) -> bool {
        matches!(self, TransactionType::Purchase | TransactionType::Adjustment)
    }

    pub fn signed_delta(self, quantity: &BigDecimal) -> BigDecimal {
        if self.is_credit() {
            quantity.clone()
        } else {
            -quantity.clone()
        }
    }
}

impl FromStr for TransactionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Purchase" => Ok(TransactionType::Purchase),
            "Consumption" => Ok(TransactionType::Consumption),
            "Adjustment" => Ok(TransactionType::Adjustment),
            "Waste" => Ok(TransactionType::Waste),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preparing_reaches_ready_and_cancelled() {
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn ready_only_reaches_delivered() {
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Preparing));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn terminal_states_reach_nothing() {
        for next in [
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("Pending".parse::<OrderStatus>().is_err());
        assert!("preparing".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn transaction_types_carry_the_sign() {
        let qty = BigDecimal::from(5);
        assert_eq!(
            TransactionType::Purchase.signed_delta(&qty),
            BigDecimal::from(5)
        );
        assert_eq!(
            TransactionType::Adjustment.signed_delta(&qty),
            BigDecimal::from(5)
        );
        assert_eq!(
            TransactionType::Consumption.signed_delta(&qty),
            BigDecimal::from(-5)
        );
        assert_eq!(TransactionType::Waste.signed_delta(&qty), BigDecimal::from(-5));
    }
}
