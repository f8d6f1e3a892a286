//! CRUD over the values nested under an item.
//!
//! Values are only addressable through their parent, so every handler loads
//! the item first and answers 404 when it is gone.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::context::TodoContext;
use crate::error::ApiError;
use crate::model::{TodoItem, TodoValue};
use crate::query::QueryOptions;

async fn load_item(ctx: &TodoContext, item_id: i32) -> Result<TodoItem, ApiError> {
    ctx.find_item(item_id).await.ok_or(ApiError::NotFound)
}

#[tracing::instrument(skip(ctx, params), fields(request_id = %ctx.request_id()))]
pub async fn list_values(
    ctx: TodoContext,
    Path(item_id): Path<i32>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let values = ctx.values_of(item_id).await.ok_or(ApiError::NotFound)?;
    let options = QueryOptions::parse::<TodoValue>(&params)?;
    Ok(Json(options.apply(values)?))
}

#[tracing::instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn get_value(ctx: TodoContext, Path((item_id, value_id)): Path<(i32, i32)>) -> Result<Json<f64>, ApiError> {
    let item = load_item(&ctx, item_id).await?;
    item.value(value_id)
        .map(|v| Json(v.value))
        .ok_or(ApiError::NotFound)
}

#[tracing::instrument(skip(ctx, payload), fields(request_id = %ctx.request_id()))]
pub async fn add_value(
    ctx: TodoContext,
    Path(item_id): Path<i32>,
    payload: Result<Json<Option<TodoValue>>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(value) = payload?;
    let value = value.ok_or_else(|| ApiError::bad_request("Item value cannot be null"))?;
    insert_value(&ctx, item_id, value).await
}

/// Store `value` under `item_id` and answer with the item's full value list.
async fn insert_value(ctx: &TodoContext, item_id: i32, value: TodoValue) -> Result<Response, ApiError> {
    load_item(ctx, item_id).await?;

    let value_id = value.id;
    ctx.add_value(value.owned_by(item_id)).await?;
    tracing::info!(item_id, value_id, "value added");

    let values = ctx.values_of(item_id).await.unwrap_or_default();
    let location = format!("/api/items/{item_id}/values");
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(values)).into_response())
}

/// Change the number stored under `value.id`. An id the item does not own is
/// treated as a new value and answered like `add_value`.
#[tracing::instrument(skip(ctx, payload), fields(request_id = %ctx.request_id()))]
pub async fn update_value(
    ctx: TodoContext,
    Path(item_id): Path<i32>,
    payload: Result<Json<Option<TodoValue>>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(value) = payload?;
    let value = value.ok_or_else(|| ApiError::bad_request("Value cannot be null"))?;
    let item = load_item(&ctx, item_id).await?;

    if item.value(value.id).is_none() {
        tracing::debug!(item_id, value_id = value.id, "value not owned by item, adding instead");
        return insert_value(&ctx, item_id, value).await;
    }

    let stored = ctx.update_value(value.id, value.value).await?;
    tracing::info!(item_id, value_id = stored.id, "value updated");
    let message = format!(
        "New value is '{}' in item {} for value {}",
        stored.value, item.id, stored.id
    );
    Ok(Json(message).into_response())
}

#[tracing::instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn delete_value(
    ctx: TodoContext,
    Path((item_id, value_id)): Path<(i32, i32)>,
) -> Result<Json<String>, ApiError> {
    let item = load_item(&ctx, item_id).await?;
    if item.value(value_id).is_none() {
        return Err(ApiError::NotFound);
    }

    let removed = ctx.remove_value(value_id).await?;
    tracing::info!(item_id, value_id, "value deleted");
    Ok(Json(format!(
        "Value with id '{}' and value '{}' was deleted from item: {}",
        removed.id, removed.value, item.id
    )))
}

/// Remove every value of an item. An item without values is a 404, not a
/// successful no-op.
#[tracing::instrument(skip(ctx), fields(request_id = %ctx.request_id()))]
pub async fn delete_all_values(ctx: TodoContext, Path(item_id): Path<i32>) -> Result<Json<String>, ApiError> {
    let item = load_item(&ctx, item_id).await?;
    if item.values.is_empty() {
        return Err(ApiError::NotFoundMessage("No values found for this item".to_string()));
    }

    let removed = ctx.remove_values_of(item_id).await;
    tracing::info!(item_id, removed, "all values deleted");
    Ok(Json(format!("All Values from item: {} was deleted", item.id)))
}
