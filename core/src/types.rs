//! Resource DTOs for the todo API.
//!
//! # Design
//! These mirror the server's `TodoItem` and `TodoValue` but are defined
//! independently, so the client does not pull in axum. The live-server
//! integration test catches schema drift between the two crates.

use serde::{Deserialize, Serialize};

/// A todo item and the values it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub values: Vec<TodoValue>,
}

/// A numeric value under an item. `todo_item_id` is assigned by the server
/// and ignored on input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TodoValue {
    pub id: i32,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todo_item_id: Option<i32>,
}

impl TodoItem {
    pub fn new(id: i32, name: &str, is_complete: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_complete,
            values: Vec::new(),
        }
    }
}

impl TodoValue {
    pub fn new(id: i32, value: f64) -> Self {
        Self {
            id,
            value,
            todo_item_id: None,
        }
    }
}

/// Result of `PUT /api/items/{id}/values`: an update of an owned value, or an
/// add when the item did not own the id.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueUpdate {
    Updated(String),
    Added(Vec<TodoValue>),
}
