use std::collections::{BTreeMap, BTreeSet};

use bigdecimal::BigDecimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{OrderEntity, OrderItemEntity};

/// One merged bill line. `order_ids` is the set of orders that contributed
/// to the line; settlement consumes it to know which rows to mark paid.
#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct BillLine {
    pub menu_item_id: i32,
    pub quantity: i64,
    #[schema(value_type = f64)]
    pub line_total: BigDecimal,
    pub order_ids: Vec<i32>,
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct TableBill {
    pub table_id: i32,
    pub lines: Vec<BillLine>,
    #[schema(value_type = f64)]
    pub total: BigDecimal,
    pub order_ids: Vec<i32>,
}

impl TableBill {
    pub fn is_empty(&self) -> bool {
        self.order_ids.is_empty()
    }
}

/// Merges the line items of a table's unpaid orders into a single payable
/// bill. Lines sharing a `menu_item_id` collapse into one entry whose
/// quantity and amount are summed; unit prices are the per-order snapshots,
/// so the same menu item may contribute at different prices.
pub fn consolidate(
    table_id: i32,
    orders: &[OrderEntity],
    items: &[OrderItemEntity],
) -> TableBill {
    let order_ids: BTreeSet<i32> = orders.iter().map(|order| order.id).collect();

    let mut merged: BTreeMap<i32, (i64, BigDecimal, BTreeSet<i32>)> = BTreeMap::new();
    for item in items {
        if !order_ids.contains(&item.order_id) {
            continue;
        }
        let entry = merged
            .entry(item.menu_item_id)
            .or_insert_with(|| (0, BigDecimal::from(0), BTreeSet::new()));
        entry.0 += i64::from(item.quantity);
        entry.1 += BigDecimal::from(item.quantity) * &item.unit_price;
        entry.2.insert(item.order_id);
    }

    let lines: Vec<BillLine> = merged
        .into_iter()
        .map(|(menu_item_id, (quantity, line_total, contributors))| BillLine {
            menu_item_id,
            quantity,
            line_total,
            order_ids: contributors.into_iter().collect(),
        })
        .collect();

    let total = lines
        .iter()
        .fold(BigDecimal::from(0), |acc, line| acc + &line.line_total);

    TableBill {
        table_id,
        lines,
        total,
        order_ids: order_ids.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn order(id: i32, table_id: i32) -> OrderEntity {
        OrderEntity {
            id,
            table_id,
            status: "Preparing".to_string(),
            payment_status: "Unpaid".to_string(),
            payment_method: None,
            total_amount: BigDecimal::from(0),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(order_id: i32, menu_item_id: i32, quantity: i32, unit_price: i32) -> OrderItemEntity {
        OrderItemEntity {
            order_id,
            menu_item_id,
            quantity,
            unit_price: BigDecimal::from(unit_price),
        }
    }

    #[test]
    fn merges_shared_menu_items_across_orders() {
        let orders = vec![order(1, 4), order(2, 4)];
        let items = vec![item(1, 7, 2, 10), item(2, 7, 1, 10)];

        let bill = consolidate(4, &orders, &items);

        assert_eq!(bill.lines.len(), 1);
        let line = &bill.lines[0];
        assert_eq!(line.menu_item_id, 7);
        assert_eq!(line.quantity, 3);
        assert_eq!(line.line_total, BigDecimal::from(30));
        assert_eq!(line.order_ids, vec![1, 2]);
        assert_eq!(bill.total, BigDecimal::from(30));
        assert_eq!(bill.order_ids, vec![1, 2]);
    }

    #[test]
    fn keeps_distinct_menu_items_as_separate_lines() {
        let orders = vec![order(1, 2), order(3, 2)];
        let items = vec![item(1, 5, 1, 12), item(3, 9, 2, 4), item(3, 5, 1, 12)];

        let bill = consolidate(2, &orders, &items);

        assert_eq!(bill.lines.len(), 2);
        assert_eq!(bill.lines[0].menu_item_id, 5);
        assert_eq!(bill.lines[0].quantity, 2);
        assert_eq!(bill.lines[0].order_ids, vec![1, 3]);
        assert_eq!(bill.lines[1].menu_item_id, 9);
        assert_eq!(bill.lines[1].order_ids, vec![3]);
        assert_eq!(bill.total, BigDecimal::from(32));
    }

    #[test]
    fn price_snapshots_are_summed_not_averaged() {
        // Same menu item ordered before and after a price change.
        let orders = vec![order(1, 1), order(2, 1)];
        let items = vec![item(1, 3, 1, 10), item(2, 3, 1, 14)];

        let bill = consolidate(1, &orders, &items);

        assert_eq!(bill.lines.len(), 1);
        assert_eq!(bill.lines[0].quantity, 2);
        assert_eq!(bill.lines[0].line_total, BigDecimal::from(24));
    }

    #[test]
    fn ignores_items_from_other_orders() {
        let orders = vec![order(1, 1)];
        let items = vec![item(1, 3, 1, 10), item(99, 3, 5, 10)];

        let bill = consolidate(1, &orders, &items);

        assert_eq!(bill.lines[0].quantity, 1);
        assert_eq!(bill.total, BigDecimal::from(10));
    }

    #[test]
    fn empty_table_yields_empty_bill() {
        let bill = consolidate(8, &[], &[]);
        assert!(bill.is_empty());
        assert!(bill.lines.is_empty());
        assert_eq!(bill.total, BigDecimal::from(0));
    }
}
