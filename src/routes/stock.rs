use anyhow::Context;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::{NaiveDate, Utc};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    alerts::{self, StockAlert},
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{
        CreateIngredientEntity, CreateInventoryTransactionEntity, IngredientEntity,
        InventoryTransactionEntity, TransactionType,
    },
    schema::{ingredients, inventory_transactions},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_ingredients, create_ingredient))
        .routes(utoipa_axum::routes!(apply_stock_transaction))
        .routes(utoipa_axum::routes!(get_stock_alerts))
        .routes(utoipa_axum::routes!(get_stock_transactions))
}

/// Fetch all ingredients.
#[utoipa::path(
    get,
    path = "/ingredients",
    tags = ["Stock"],
    responses(
        (status = 200, description = "List all ingredients", body = StdResponse<Vec<IngredientEntity>, String>)
    )
)]
async fn get_ingredients(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let all_ingredients: Vec<IngredientEntity> = ingredients::table
        .order_by(ingredients::name.asc())
        .get_results(conn)
        .await
        .context("Failed to get ingredients")?;

    Ok(StdResponse {
        data: Some(all_ingredients),
        message: Some("Get ingredients successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateIngredientReq {
    name: String,
    unit: String,
    #[schema(value_type = f64)]
    #[serde(default)]
    current_stock: BigDecimal,
    #[schema(value_type = f64)]
    #[serde(default)]
    minimum_stock: BigDecimal,
    #[schema(value_type = f64)]
    #[serde(default)]
    price_per_unit: BigDecimal,
    supplier: Option<String>,
    last_purchase_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
struct CreateIngredientRes {
    ingredient: IngredientEntity,
    opening_transaction: Option<InventoryTransactionEntity>,
}

/// Register an ingredient. A non-zero opening stock is recorded as a
/// Purchase transaction so the balance always equals the ledger's sum.
#[utoipa::path(
    post,
    path = "/ingredients",
    tags = ["Stock"],
    request_body = CreateIngredientReq,
    responses(
        (status = 201, description = "Created ingredient successfully", body = StdResponse<CreateIngredientRes, String>),
        (status = 400, description = "Missing name/unit or negative amounts"),
    )
)]
async fn create_ingredient(
    State(state): State<AppState>,
    Json(body): Json<CreateIngredientReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.name.trim().is_empty() || body.unit.trim().is_empty() {
        return Err(AppError::BadRequest("name and unit are required".into()));
    }
    if body.current_stock < BigDecimal::zero()
        || body.minimum_stock < BigDecimal::zero()
        || body.price_per_unit < BigDecimal::zero()
    {
        return Err(AppError::BadRequest(
            "Stock and price amounts must not be negative".into(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (ingredient, opening_transaction) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let opening_stock = body.current_stock.clone();
                let ingredient: IngredientEntity = diesel::insert_into(ingredients::table)
                    .values(CreateIngredientEntity {
                        name: body.name,
                        unit: body.unit,
                        current_stock: body.current_stock,
                        minimum_stock: body.minimum_stock,
                        price_per_unit: body.price_per_unit,
                        supplier: body.supplier,
                        last_purchase_date: body.last_purchase_date,
                        expiry_date: body.expiry_date,
                    })
                    .returning(IngredientEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create ingredient")?;

                let opening_transaction = if opening_stock > BigDecimal::zero() {
                    let transaction: InventoryTransactionEntity =
                        diesel::insert_into(inventory_transactions::table)
                            .values(CreateInventoryTransactionEntity {
                                ingredient_id: ingredient.id,
                                transaction_type: TransactionType::Purchase.as_str().to_string(),
                                quantity: opening_stock,
                                notes: Some("Opening stock".to_string()),
                            })
                            .returning(InventoryTransactionEntity::as_returning())
                            .get_result(conn)
                            .await
                            .context("Failed to record opening stock")?;
                    Some(transaction)
                } else {
                    None
                };

                Ok::<(IngredientEntity, Option<InventoryTransactionEntity>), anyhow::Error>((
                    ingredient,
                    opening_transaction,
                ))
            })
        })
        .await
        .context("Transaction failed")?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(CreateIngredientRes {
                ingredient,
                opening_transaction,
            }),
            message: Some("Created ingredient successfully"),
        },
    ))
}

#[derive(Deserialize, ToSchema)]
struct StockUpdateReq {
    ingredient_id: i32,
    #[schema(value_type = f64)]
    quantity: BigDecimal,
    transaction_type: String,
    notes: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct StockUpdateRes {
    transaction: InventoryTransactionEntity,
    ingredient: IngredientEntity,
}

/// Apply one ledger transaction: append the log row and move the balance in
/// the same database transaction. Purchase and Adjustment credit the stock,
/// Consumption and Waste debit it; a debit past zero is rejected and leaves
/// the balance untouched.
#[utoipa::path(
    put,
    path = "/stock/update",
    tags = ["Stock"],
    request_body = StockUpdateReq,
    responses(
        (status = 200, description = "Stock updated", body = StdResponse<StockUpdateRes, String>),
        (status = 400, description = "Unknown transaction type or non-positive quantity"),
        (status = 404, description = "Ingredient not found"),
        (status = 409, description = "Debit exceeds the available stock"),
    )
)]
async fn apply_stock_transaction(
    State(state): State<AppState>,
    Json(body): Json<StockUpdateReq>,
) -> Result<impl IntoResponse, AppError> {
    let transaction_type: TransactionType = body.transaction_type.parse().map_err(|_| {
        AppError::BadRequest(format!(
            "{} is not a valid transaction type",
            body.transaction_type
        ))
    })?;
    if body.quantity <= BigDecimal::zero() {
        return Err(AppError::BadRequest("quantity must be positive".into()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (transaction, ingredient) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let ingredient: IngredientEntity = ingredients::table
                    .find(body.ingredient_id)
                    .for_update()
                    .get_result(conn)
                    .await?;

                let new_stock = &ingredient.current_stock
                    + transaction_type.signed_delta(&body.quantity);
                if new_stock < BigDecimal::zero() {
                    return Err(AppError::Conflict(format!(
                        "Insufficient stock for {}: {} {} available, {} requested",
                        ingredient.name,
                        ingredient.current_stock,
                        ingredient.unit,
                        body.quantity
                    )));
                }

                let transaction: InventoryTransactionEntity =
                    diesel::insert_into(inventory_transactions::table)
                        .values(CreateInventoryTransactionEntity {
                            ingredient_id: ingredient.id,
                            transaction_type: transaction_type.as_str().to_string(),
                            quantity: body.quantity,
                            notes: body.notes,
                        })
                        .returning(InventoryTransactionEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to append inventory transaction")?;

                let updated: IngredientEntity = if transaction_type == TransactionType::Purchase {
                    diesel::update(ingredients::table.find(ingredient.id))
                        .set((
                            ingredients::current_stock.eq(&new_stock),
                            ingredients::last_purchase_date.eq(Utc::now().date_naive()),
                            ingredients::updated_at.eq(diesel::dsl::now),
                        ))
                        .returning(IngredientEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update stock balance")?
                } else {
                    diesel::update(ingredients::table.find(ingredient.id))
                        .set((
                            ingredients::current_stock.eq(&new_stock),
                            ingredients::updated_at.eq(diesel::dsl::now),
                        ))
                        .returning(IngredientEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update stock balance")?
                };

                Ok::<(InventoryTransactionEntity, IngredientEntity), AppError>((
                    transaction,
                    updated,
                ))
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(StockUpdateRes {
            transaction,
            ingredient,
        }),
        message: Some("Stock updated successfully"),
    })
}

/// Combined alert feed: ingredients at or below minimum stock (Critical),
/// within one and a half times the minimum (Low), or expiring within seven
/// days (Expiring).
#[utoipa::path(
    get,
    path = "/stock/alerts",
    tags = ["Stock"],
    responses(
        (status = 200, description = "Stock alerts", body = StdResponse<Vec<StockAlert>, String>)
    )
)]
async fn get_stock_alerts(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let all_ingredients: Vec<IngredientEntity> = ingredients::table
        .get_results(conn)
        .await
        .context("Failed to get ingredients")?;

    let feed = alerts::build_feed(all_ingredients, Utc::now().date_naive());

    Ok(StdResponse {
        data: Some(feed),
        message: Some("Get stock alerts successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct GetStockTransactionsRes {
    ingredient: IngredientEntity,
    transactions: Vec<InventoryTransactionEntity>,
}

/// The ledger for one ingredient, newest first.
#[utoipa::path(
    get,
    path = "/stock/transactions/{ingredient_id}",
    tags = ["Stock"],
    params(
        ("ingredient_id" = i32, Path, description = "Ingredient whose ledger to fetch")
    ),
    responses(
        (status = 200, description = "Inventory transactions", body = StdResponse<GetStockTransactionsRes, String>),
        (status = 404, description = "Ingredient not found"),
    )
)]
async fn get_stock_transactions(
    Path(ingredient_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let ingredient: IngredientEntity = ingredients::table
        .find(ingredient_id)
        .get_result(conn)
        .await
        .map_err(AppError::from)?;

    let transactions: Vec<InventoryTransactionEntity> = inventory_transactions::table
        .filter(inventory_transactions::ingredient_id.eq(ingredient.id))
        .order_by(inventory_transactions::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get inventory transactions")?;

    Ok(StdResponse {
        data: Some(GetStockTransactionsRes {
            ingredient,
            transactions,
        }),
        message: Some("Get inventory transactions successfully"),
    })
}
