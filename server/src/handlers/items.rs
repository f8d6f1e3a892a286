//! CRUD over todo items.
//!
//! Every item handler first makes sure the store has been seeded, so the
//! sample item is visible from the very first item request.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;

use crate::context::TodoContext;
use crate::error::ApiError;
use crate::model::TodoItem;
use crate::query::QueryOptions;
use crate::seed::Initializer;

fn require_name(item: &TodoItem) -> Result<(), ApiError> {
    if item.name.trim().is_empty() {
        return Err(ApiError::bad_request("Wrong request: item name must not be empty"));
    }
    Ok(())
}

#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id()))]
pub async fn list_all(
    State(init): State<Arc<Initializer>>,
    ctx: TodoContext,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    init.ensure_seeded(&ctx).await?;
    let options = QueryOptions::parse::<TodoItem>(&params)?;
    let items = ctx.items_with_values().await;
    Ok(Json(options.apply(items)?))
}

#[tracing::instrument(skip(init, ctx), fields(request_id = %ctx.request_id()))]
pub async fn get_by_id(
    State(init): State<Arc<Initializer>>,
    ctx: TodoContext,
    Path(id): Path<i32>,
) -> Result<Json<TodoItem>, ApiError> {
    init.ensure_seeded(&ctx).await?;
    ctx.find_item(id).await.map(Json).ok_or(ApiError::NotFound)
}

#[tracing::instrument(skip_all, fields(request_id = %ctx.request_id()))]
pub async fn create(
    State(init): State<Arc<Initializer>>,
    ctx: TodoContext,
    payload: Result<Json<Option<TodoItem>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    init.ensure_seeded(&ctx).await?;
    let Json(item) = payload?;
    let item = item.ok_or(ApiError::BadRequest(None))?;
    require_name(&item)?;

    if ctx.find_item(item.id).await.is_some() {
        return Err(ApiError::bad_request(format!(
            "Wrong request: item with id {} has already been added",
            item.id
        )));
    }

    let created = ctx.add_item(item).await?;
    tracing::info!(item_id = created.id, values = created.values.len(), "item created");
    let location = format!("/api/items/{}", created.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(created)))
}

/// Replace `name` and `isComplete`. Values in the body are ignored; they are
/// managed through the value endpoints.
#[tracing::instrument(skip(init, ctx, payload), fields(request_id = %ctx.request_id()))]
pub async fn update(
    State(init): State<Arc<Initializer>>,
    ctx: TodoContext,
    Path(id): Path<i32>,
    payload: Result<Json<Option<TodoItem>>, JsonRejection>,
) -> Result<Json<TodoItem>, ApiError> {
    init.ensure_seeded(&ctx).await?;
    let Json(item) = payload?;
    let item = item.filter(|item| item.id == id).ok_or(ApiError::BadRequest(None))?;
    require_name(&item)?;

    if ctx.find_item(id).await.is_none() {
        return Err(ApiError::NotFound);
    }

    let updated = ctx.update_item(id, item.name, item.is_complete).await?;
    tracing::info!(item_id = id, "item updated");
    Ok(Json(updated))
}

#[tracing::instrument(skip(init, ctx), fields(request_id = %ctx.request_id()))]
pub async fn delete(
    State(init): State<Arc<Initializer>>,
    ctx: TodoContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    init.ensure_seeded(&ctx).await?;
    if ctx.find_item(id).await.is_none() {
        return Err(ApiError::NotFound);
    }

    let removed = ctx.remove_item(id).await?;
    tracing::info!(item_id = id, values = removed.values.len(), "item deleted");
    Ok(StatusCode::NO_CONTENT)
}
