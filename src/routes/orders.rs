use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, anyhow};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    api::{
        menu_items::get_menu_items,
        tables::{get_table, get_tables},
    },
    core::{
        aliases::DieselError,
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
        .routes(utoipa_axum::routes!(create_order))
        .routes(utoipa_axum::routes!(get_orders))
        .routes(utoipa_axum::routes!(get_order, replace_order_items, delete_order))
        .routes(utoipa_axum::routes!(update_order_status))
        .routes(utoipa_axum::routes!(update_order_payment))
}

#[derive(Deserialize, ToSchema)]
pub struct OrderItemReq {
    pub menu_item_id: i32,
    pub quantity: i32,
}

/// Collapses duplicate menu item ids by summing their quantities; the
/// order_items key is (order_id, menu_item_id).
fn merge_item_requests(items: &[OrderItemReq]) -> Result<BTreeMap<i32, i32>, AppError> {
    let mut merged: BTreeMap<i32, i32> = BTreeMap::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(AppError::BadRequest(format!(
                "Quantity for menu item {} must be positive",
                item.menu_item_id
            )));
        }
        *merged.entry(item.menu_item_id).or_insert(0) += item.quantity;
    }
    Ok(merged)
}

/// Resolves unit price snapshots for the requested items and recomputes the
/// order total. The client never supplies prices or totals.
async fn price_items(
    state: &AppState,
    merged: &BTreeMap<i32, i32>,
) -> Result<(Vec<(i32, i32, BigDecimal)>, BigDecimal), AppError> {
    if merged.is_empty() {
        return Ok((Vec::new(), BigDecimal::from(0)));
    }

    let menu = get_menu_items(state.http_client.clone()).await?;

    let mut lines = Vec::with_capacity(merged.len());
    let mut total = BigDecimal::from(0);
    for (&menu_item_id, &quantity) in merged {
        let Some(menu_item) = menu.get(&menu_item_id) else {
            return Err(AppError::BadRequest(format!(
                "Menu item {} does not exist",
                menu_item_id
            )));
        };
        if menu_item.is_unavailable() {
            return Err(AppError::BadRequest(format!(
                "Menu item {} is not available",
                menu_item.name
            )));
        }
        total += BigDecimal::from(quantity) * &menu_item.price;
        lines.push((menu_item_id, quantity, menu_item.price.clone()));
    }
    Ok((lines, total))
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    table_id: i32,
    order_items: Vec<OrderItemReq>,
    notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct CreateOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Create a new order for a table. The order opens as Preparing/Unpaid with
/// unit prices snapshotted from the menu service.
#[utoipa::path(
    post,
    path = "/order",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Created order successfully", body = StdResponse<CreateOrderRes, String>),
        (status = 400, description = "Empty items or unresolvable table/menu item"),
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.order_items.is_empty() {
        return Err(AppError::BadRequest("order_items must not be empty".into()));
    }
    let merged = merge_item_requests(&body.order_items)?;

    let table = get_table(state.http_client.clone(), body.table_id).await?;
    if table.is_none() {
        return Err(AppError::BadRequest(format!(
            "Table {} does not exist",
            body.table_id
        )));
    }

    let (lines, total) = price_items(&state, &merged).await?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (order, order_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = diesel::insert_into(orders::table)
                    .values(CreateOrderEntity {
                        table_id: body.table_id,
                        status: OrderStatus::Preparing.as_str().to_string(),
                        payment_status: PaymentStatus::Unpaid.as_str().to_string(),
                        total_amount: total,
                        notes: body.notes,
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let new_items: Vec<CreateOrderItemEntity> = lines
                    .into_iter()
                    .map(|(menu_item_id, quantity, unit_price)| CreateOrderItemEntity {
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
                    .context("Failed to create order items")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), anyhow::Error>((order, order_items))
            })
        })
        .await
        .context("Transaction failed")?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(CreateOrderRes { order, order_items }),
            message: Some("Created order successfully"),
        },
    ))
}

#[derive(Serialize, ToSchema)]
struct OrderItemView {
    menu_item_id: i32,
    name: Option<String>,
    quantity: i32,
    #[schema(value_type = f64)]
    unit_price: BigDecimal,
}

#[derive(Serialize, ToSchema)]
struct GetOrderRes {
    order: OrderEntity,
    table_name: Option<String>,
    order_items: Vec<OrderItemView>,
}

/// Kitchen listing: every order newest-first with its items and resolved
/// table and menu item names.
#[utoipa::path(
    get,
    path = "/orders",
    tags = ["Orders"],
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<GetOrderRes>, String>)
    )
)]
async fn get_orders(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let all_orders: Vec<OrderEntity> = orders::table
        .order_by(orders::created_at.desc())
        .then_order_by(orders::id.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let order_ids: Vec<i32> = all_orders.iter().map(|order| order.id).collect();
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let menu = get_menu_items(state.http_client.clone()).await?;
    let tables = get_tables(state.http_client.clone()).await?;

    let mut group: HashMap<i32, Vec<OrderItemView>> = HashMap::new();
    for item in items {
        group.entry(item.order_id).or_default().push(OrderItemView {
            name: menu.get(&item.menu_item_id).map(|m| m.name.clone()),
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        });
    }

    let orders_with_items: Vec<GetOrderRes> = all_orders
        .into_iter()
        .map(|order| GetOrderRes {
            table_name: tables.get(&order.table_id).map(|t| t.name.clone()),
            order_items: group.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect();

    Ok(StdResponse {
        data: Some(orders_with_items),
        message: Some("Get orders successfully"),
    })
}

/// Fetch a specific order with its items.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "Order not found"),
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<OrderEntity> = orders::table.find(id).get_result(conn).await;

    let order = match order {
        Ok(order) => order,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let menu = get_menu_items(state.http_client.clone()).await?;
    let table = get_table(state.http_client.clone(), order.table_id).await?;

    let order_items = items
        .into_iter()
        .map(|item| OrderItemView {
            name: menu.get(&item.menu_item_id).map(|m| m.name.clone()),
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        })
        .collect();

    Ok(StdResponse {
        data: Some(GetOrderRes {
            order,
            table_name: table.map(|t| t.name),
            order_items,
        }),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ReplaceOrderItemsReq {
    table_id: Option<i32>,
    items: Vec<OrderItemReq>,
}

#[derive(Serialize, ToSchema)]
struct ReplaceOrderItemsRes {
    updated_order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
}

/// Destructive items replace: the submitted set becomes the order's entire
/// item list (an empty list empties the order). Optionally moves the order
/// to another table. The total is recomputed from fresh price snapshots.
#[utoipa::path(
    put,
    path = "/orders/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = ReplaceOrderItemsReq,
    responses(
        (status = 200, description = "Updated order successfully", body = StdResponse<ReplaceOrderItemsRes, String>),
        (status = 400, description = "Invalid items or unresolvable table"),
        (status = 404, description = "Order not found"),
    )
)]
async fn replace_order_items(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<ReplaceOrderItemsReq>,
) -> Result<impl IntoResponse, AppError> {
    let merged = merge_item_requests(&body.items)?;

    if let Some(table_id) = body.table_id {
        let table = get_table(state.http_client.clone(), table_id).await?;
        if table.is_none() {
            return Err(AppError::BadRequest(format!(
                "Table {} does not exist",
                table_id
            )));
        }
    }

    let (lines, total) = price_items(&state, &merged).await?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (updated_order, order_items) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(id)
                    .for_update()
                    .get_result(conn)
                    .await?;

                diesel::delete(order_items::table.filter(order_items::order_id.eq(order.id)))
                    .execute(conn)
                    .await
                    .context("Failed to delete order items")?;

                let new_items: Vec<CreateOrderItemEntity> = lines
                    .into_iter()
                    .map(|(menu_item_id, quantity, unit_price)| CreateOrderItemEntity {
                        order_id: order.id,
                        menu_item_id,
                        quantity,
                        unit_price,
                    })
                    .collect();

                let inserted: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                    .values(new_items)
                    .returning(OrderItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to insert order items")?;

                let updated_order: OrderEntity = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::table_id.eq(body.table_id.unwrap_or(order.table_id)),
                        orders::total_amount.eq(total),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update order")?;

                Ok::<(OrderEntity, Vec<OrderItemEntity>), AppError>((updated_order, inserted))
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(ReplaceOrderItemsRes {
            updated_order,
            order_items,
        }),
        message: Some("Updated order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: String,
}

/// Move an order through its preparation states. Preparing may become Ready
/// or Cancelled, Ready may become Delivered; Delivered and Cancelled are
/// terminal. Re-submitting the current status succeeds without a write.
#[utoipa::path(
    put,
    path = "/order/{id}/status",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to transition")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Order status updated", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Unknown status value"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Transition not allowed from the current status"),
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let new_status: OrderStatus = body
        .status
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} is not a valid order status", body.status)))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated_order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let order: OrderEntity = orders::table
                    .find(id)
                    .for_update()
                    .get_result(conn)
                    .await?;

                let current: OrderStatus = order.status.parse().map_err(|_| {
                    AppError::Other(anyhow!(
                        "Order {} has a malformed status {:?}",
                        order.id,
                        order.status
                    ))
                })?;

                if current == new_status {
                    return Ok(order);
                }
                if !current.can_transition_to(new_status) {
                    return Err(AppError::Conflict(format!(
                        "Order cannot move from {} to {}",
                        current, new_status
                    )));
                }

                let updated_order: OrderEntity = diesel::update(orders::table.find(order.id))
                    .set((
                        orders::status.eq(new_status.as_str()),
                        orders::updated_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update order status")?;

                Ok::<OrderEntity, AppError>(updated_order)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated_order),
        message: Some("Order status updated successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderPaymentReq {
    payment_method: String,
    payment_status: String,
}

/// Settle a single order's payment fields. Table-level settlement lives
/// under `/orders/table/{table_id}/settle`.
#[utoipa::path(
    put,
    path = "/order/{id}/payment",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to settle")
    ),
    request_body = UpdateOrderPaymentReq,
    responses(
        (status = 200, description = "Order payment updated", body = StdResponse<OrderEntity, String>),
        (status = 400, description = "Invalid payment status or method"),
        (status = 404, description = "Order not found"),
    )
)]
async fn update_order_payment(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderPaymentReq>,
) -> Result<impl IntoResponse, AppError> {
    let payment_status: PaymentStatus = body.payment_status.parse().map_err(|_| {
        AppError::BadRequest(format!(
            "{} is not a valid payment status",
            body.payment_status
        ))
    })?;
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

    let updated_order: QueryResult<OrderEntity> = diesel::update(orders::table.find(id))
        .set((
            orders::payment_status.eq(payment_status.as_str()),
            orders::payment_method.eq(body.payment_method),
            orders::updated_at.eq(diesel::dsl::now),
        ))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await;

    match updated_order {
        Ok(updated_order) => Ok(StdResponse {
            data: Some(updated_order),
            message: Some("Order payment updated successfully"),
        }),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

/// Delete an order and its items.
#[utoipa::path(
    delete,
    path = "/orders/{id}",
    tags = ["Orders"],
    params(
        ("id" = i32, Path, description = "Order ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted order successfully", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "Order not found"),
    )
)]
async fn delete_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted_order = conn
        .transaction(move |conn| {
            Box::pin(async move {
                diesel::delete(order_items::table.filter(order_items::order_id.eq(id)))
                    .execute(conn)
                    .await
                    .context("Failed to delete order items")?;

                let deleted_order: OrderEntity = diesel::delete(orders::table.find(id))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await?;

                Ok::<OrderEntity, AppError>(deleted_order)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(deleted_order),
        message: Some("Deleted order successfully"),
    })
}
