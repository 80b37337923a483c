use std::collections::BTreeMap;

use anyhow::{Context, anyhow};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::{BigDecimal, Zero};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::{menu_items::get_menu_items, tables::get_table},
    billing::{self, BillLine, TableBill},
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{
        CreateOrderEntity, CreateOrderItemEntity, OrderEntity, OrderItemEntity, OrderStatus,
        PaymentStatus,
    },
    schema::{order_items, orders},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_table_bill))
        .routes(utoipa_axum::routes!(settle_table))
        .routes(utoipa_axum::routes!(create_consolidated_order))
}

#[derive(Serialize, ToSchema)]
struct BillLineView {
    menu_item_id: i32,
    name: Option<String>,
    quantity: i64,
    #[schema(value_type = f64)]
    line_total: BigDecimal,
    order_ids: Vec<i32>,
}

#[derive(Serialize, ToSchema)]
struct GetTableBillRes {
    table_id: i32,
    table_name: Option<String>,
    lines: Vec<BillLineView>,
    #[schema(value_type = f64)]
    total: BigDecimal,
    order_ids: Vec<i32>,
}

async fn load_unpaid_bill<C>(conn: &mut C, table_id: i32) -> Result<TableBill, AppError>
where
    C: diesel_async::AsyncConnection<Backend = diesel::pg::Pg>,
{
    let unpaid_orders: Vec<OrderEntity> = orders::table
        .filter(orders::table_id.eq(table_id))
        .filter(orders::payment_status.eq(PaymentStatus::Unpaid.as_str()))
        .get_results(conn)
        .await
        .context("Failed to get unpaid orders")?;

    let order_ids: Vec<i32> = unpaid_orders.iter().map(|order| order.id).collect();
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    Ok(billing::consolidate(table_id, &unpaid_orders, &items))
}

/// The table's unpaid bill: items of every unpaid order merged per menu
/// item, each line keeping the ids of the orders that contributed to it.
#[utoipa::path(
    get,
    path = "/orders/table/{table_id}",
    tags = ["Billing"],
    params(
        ("table_id" = i32, Path, description = "Table to bill")
    ),
    responses(
        (status = 200, description = "Consolidated unpaid bill", body = StdResponse<GetTableBillRes, String>)
    )
)]
async fn get_table_bill(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let bill = load_unpaid_bill(conn, table_id).await?;

    let menu = get_menu_items(state.http_client.clone()).await?;
    let table = get_table(state.http_client.clone(), table_id).await?;

    let lines = bill
        .lines
        .into_iter()
        .map(|line: BillLine| BillLineView {
            name: menu.get(&line.menu_item_id).map(|m| m.name.clone()),
            menu_item_id: line.menu_item_id,
            quantity: line.quantity,
            line_total: line.line_total,
            order_ids: line.order_ids,
        })
        .collect();

    Ok(StdResponse {
        data: Some(GetTableBillRes {
            table_id,
            table_name: table.map(|t| t.name),
            lines,
            total: bill.total,
            order_ids: bill.order_ids,
        }),
        message: Some("Get table bill successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct SettleTableReq {
    payment_method: String,
}

#[derive(Serialize, ToSchema)]
struct SettleTableRes {
    settled_order_ids: Vec<i32>,
    #[schema(value_type = f64)]
    total: BigDecimal,
}

/// Marks every unpaid order of the table as Paid in one transaction. The
/// unpaid set is locked first, so a concurrent settle on the same table
/// either waits or finds nothing left and reports an empty settlement.
#[utoipa::path(
    post,
    path = "/orders/table/{table_id}/settle",
    tags = ["Billing"],
    params(
        ("table_id" = i32, Path, description = "Table to settle")
    ),
    request_body = SettleTableReq,
    responses(
        (status = 200, description = "All unpaid orders settled", body = StdResponse<SettleTableRes, String>),
        (status = 400, description = "Missing payment method"),
    )
)]
async fn settle_table(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<SettleTableReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.payment_method.trim().is_empty() {
        return Err(AppError::BadRequest(
            "payment_method must not be empty".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (settled_order_ids, total) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let unpaid_orders: Vec<OrderEntity> = orders::table
                    .filter(orders::table_id.eq(table_id))
                    .filter(orders::payment_status.eq(PaymentStatus::Unpaid.as_str()))
                    .for_update()
                    .get_results(conn)
                    .await
                    .context("Failed to lock unpaid orders")?;

                if unpaid_orders.is_empty() {
                    return Ok((Vec::new(), BigDecimal::zero()));
                }

                let order_ids: Vec<i32> = unpaid_orders.iter().map(|order| order.id).collect();
                let total = unpaid_orders
                    .iter()
                    .fold(BigDecimal::zero(), |acc, order| acc + &order.total_amount);

                let settled: Vec<OrderEntity> =
                    diesel::update(orders::table.filter(orders::id.eq_any(&order_ids)))
                        .set((
                            orders::payment_status.eq(PaymentStatus::Paid.as_str()),
                            orders::payment_method.eq(&body.payment_method),
                            orders::updated_at.eq(diesel::dsl::now),
                        ))
                        .returning(OrderEntity::as_returning())
                        .get_results(conn)
                        .await
                        .context("Failed to settle orders")?;

                if settled.len() != order_ids.len() {
                    return Err(AppError::Other(anyhow!(
                        "Settled {} of {} orders for table {}",
                        settled.len(),
                        order_ids.len(),
                        table_id
                    )));
                }

                Ok::<(Vec<i32>, BigDecimal), AppError>((order_ids, total))
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(SettleTableRes {
            settled_order_ids,
            total,
        }),
        message: Some("Table settled successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ConsolidatedItemReq {
    menu_item_id: i32,
    quantity: i32,
    #[schema(value_type = f64)]
    unit_price: BigDecimal,
}

#[derive(Deserialize, ToSchema)]
struct CreateConsolidatedOrderReq {
    items: Vec<ConsolidatedItemReq>,
    notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct CreateConsolidatedOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Creates one fresh order out of an already-merged line set, preserving
/// the unit price snapshots carried by the bill. Used when staff collapse
/// several cart additions into a single order before settling.
#[utoipa::path(
    post,
    path = "/orders/table/{table_id}/consolidate",
    tags = ["Billing"],
    params(
        ("table_id" = i32, Path, description = "Table the consolidated order belongs to")
    ),
    request_body = CreateConsolidatedOrderReq,
    responses(
        (status = 201, description = "Created consolidated order", body = StdResponse<CreateConsolidatedOrderRes, String>),
        (status = 400, description = "Empty items or unresolvable table"),
    )
)]
async fn create_consolidated_order(
    Path(table_id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CreateConsolidatedOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.items.is_empty() {
        return Err(AppError::BadRequest("items must not be empty".into()));
    }
    for item in &body.items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Quantity for menu item {} must be positive",
                item.menu_item_id
            )));
        }
        if item.unit_price < BigDecimal::zero() {
            return Err(AppError::BadRequest(format!(
                "Unit price for menu item {} must not be negative",
                item.menu_item_id
            )));
        }
    }

    let table = get_table(state.http_client.clone(), table_id).await?;
    if table.is_none() {
        return Err(AppError::BadRequest(format!(
            "Table {} does not exist",
            table_id
        )));
    }

    // Bill lines are already unique per menu item; re-merge in case the
    // caller hand-built the list.
    let mut merged: BTreeMap<i32, (i32, BigDecimal)> = BTreeMap::new();
    for item in body.items {
        let entry = merged
            .entry(item.menu_item_id)
            .or_insert_with(|| (0, item.unit_price.clone()));
        entry.0 += item.quantity;
    }

    let total = merged
        .iter()
        .fold(BigDecimal::zero(), |acc, (_, (quantity, unit_price))| {
            acc + BigDecimal::from(*quantity) * unit_price
        });

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let notes = body.notes;
    let (order, order_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        table_id,
                        status: OrderStatus::Preparing.as_str().to_string(),
                        payment_status: PaymentStatus::Unpaid.as_str().to_string(),
                        total_amount: total,
                        notes,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create consolidated order")?;

                let new_items: Vec<CreateOrderItemEntity> = merged
                    .into_iter()
                    .map(|(menu_item_id, (quantity, unit_price))| CreateOrderItemEntity {
                        order_id: order.id,
                        menu_item_id,
                        quantity,
                        unit_price,
                    })
                    .collect();

                let order_items = diesel::insert_into(order_items::table)
                    .values(new_items)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create consolidated order items")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), anyhow::Error>((order, order_items))
            })
        })
        .await
        .context("Transaction failed")?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(CreateConsolidatedOrderRes { order, order_items }),
            message: Some("Created consolidated order successfully"),
        },
    ))
}
