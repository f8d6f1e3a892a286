//! In-memory storage for items and values.
//!
//! # Design
//! `Store` owns the two tables for the lifetime of the process and is shared
//! through the router state. Handlers never touch it directly: each request
//! extracts its own `TodoContext`, a cheap handle that tags the request with
//! an id for tracing and exposes the persistence operations.
//!
//! Every operation takes the table lock once for its whole
//! read-check-mutate sequence, so inserting an item with its values and
//! deleting an item with its values are both atomic.

use std::{collections::BTreeMap, convert::Infallible, sync::Arc};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{TodoItem, TodoValue};

/// Integrity failures raised by the storage layer.
#[derive(Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("an item with key {0} is already stored")]
    DuplicateItem(i32),

    #[error("a value with key {0} is already stored")]
    DuplicateValue(i32),

    #[error("item with key {0} does not exist")]
    MissingItem(i32),

    #[error("value with key {0} does not exist")]
    MissingValue(i32),
}

#[derive(Debug, Clone)]
struct ItemRow {
    name: String,
    is_complete: bool,
}

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<i32, ItemRow>,
    values: BTreeMap<i32, TodoValue>,
}

impl Tables {
    fn load(&self, id: i32) -> Option<TodoItem> {
        let row = self.items.get(&id)?;
        Some(TodoItem {
            id,
            name: row.name.clone(),
            is_complete: row.is_complete,
            values: self.children(id),
        })
    }

    fn children(&self, item_id: i32) -> Vec<TodoValue> {
        self.values
            .values()
            .filter(|v| v.todo_item_id == Some(item_id))
            .cloned()
            .collect()
    }
}

/// Process-wide tables shared by every request.
#[derive(Clone, Default)]
pub struct Store {
    tables: Arc<RwLock<Tables>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a storage context for one unit of work.
    pub fn context(&self) -> TodoContext {
        TodoContext {
            store: self.clone(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Request-scoped handle to the store.
#[derive(Clone)]
pub struct TodoContext {
    store: Store,
    request_id: Uuid,
}

impl<S> FromRequestParts<S> for TodoContext
where
    Store: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Store::from_ref(state).context())
    }
}

impl TodoContext {
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub async fn item_count(&self) -> usize {
        self.store.tables.read().await.items.len()
    }

    /// All items ordered by id, each with its values loaded.
    pub async fn items_with_values(&self) -> Vec<TodoItem> {
        let tables = self.store.tables.read().await;
        tables.items.keys().filter_map(|id| tables.load(*id)).collect()
    }

    pub async fn find_item(&self, id: i32) -> Option<TodoItem> {
        self.store.tables.read().await.load(id)
    }

    /// Values of an item, or `None` when the item does not exist.
    pub async fn values_of(&self, item_id: i32) -> Option<Vec<TodoValue>> {
        let tables = self.store.tables.read().await;
        tables.items.contains_key(&item_id).then(|| tables.children(item_id))
    }

    /// Insert an item together with its values. Nothing is written unless
    /// every key is free.
    pub async fn add_item(&self, item: TodoItem) -> Result<TodoItem, StorageError> {
        let mut tables = self.store.tables.write().await;
        if tables.items.contains_key(&item.id) {
            return Err(StorageError::DuplicateItem(item.id));
        }
        let mut seen = Vec::with_capacity(item.values.len());
        for value in &item.values {
            if tables.values.contains_key(&value.id) || seen.contains(&value.id) {
                return Err(StorageError::DuplicateValue(value.id));
            }
            seen.push(value.id);
        }

        tables.items.insert(
            item.id,
            ItemRow {
                name: item.name,
                is_complete: item.is_complete,
            },
        );
        for value in item.values {
            let value = value.owned_by(item.id);
            tables.values.insert(value.id, value);
        }
        tracing::debug!(request_id = %self.request_id, item_id = item.id, "item stored");
        tables.load(item.id).ok_or(StorageError::MissingItem(item.id))
    }

    /// Overwrite the scalar fields of an item. Values are left alone.
    pub async fn update_item(&self, id: i32, name: String, is_complete: bool) -> Result<TodoItem, StorageError> {
        let mut tables = self.store.tables.write().await;
        let row = tables.items.get_mut(&id).ok_or(StorageError::MissingItem(id))?;
        row.name = name;
        row.is_complete = is_complete;
        tables.load(id).ok_or(StorageError::MissingItem(id))
    }

    /// Remove an item and every value that references it.
    pub async fn remove_item(&self, id: i32) -> Result<TodoItem, StorageError> {
        let mut tables = self.store.tables.write().await;
        let removed = tables.load(id).ok_or(StorageError::MissingItem(id))?;
        tables.items.remove(&id);
        tables.values.retain(|_, v| v.todo_item_id != Some(id));
        tracing::debug!(
            request_id = %self.request_id,
            item_id = id,
            cascaded = removed.values.len(),
            "item removed"
        );
        Ok(removed)
    }

    pub async fn add_value(&self, value: TodoValue) -> Result<(), StorageError> {
        let mut tables = self.store.tables.write().await;
        if tables.values.contains_key(&value.id) {
            return Err(StorageError::DuplicateValue(value.id));
        }
        if let Some(item_id) = value.todo_item_id {
            if !tables.items.contains_key(&item_id) {
                return Err(StorageError::MissingItem(item_id));
            }
        }
        tables.values.insert(value.id, value);
        Ok(())
    }

    pub async fn update_value(&self, id: i32, value: f64) -> Result<TodoValue, StorageError> {
        let mut tables = self.store.tables.write().await;
        let stored = tables.values.get_mut(&id).ok_or(StorageError::MissingValue(id))?;
        stored.value = value;
        Ok(stored.clone())
    }

    pub async fn remove_value(&self, id: i32) -> Result<TodoValue, StorageError> {
        let mut tables = self.store.tables.write().await;
        tables.values.remove(&id).ok_or(StorageError::MissingValue(id))
    }

    /// Remove all values of an item, returning how many were dropped.
    pub async fn remove_values_of(&self, item_id: i32) -> usize {
        let mut tables = self.store.tables.write().await;
        let before = tables.values.len();
        tables.values.retain(|_, v| v.todo_item_id != Some(item_id));
        before - tables.values.len()
    }
}
