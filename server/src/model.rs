//! Resource types shared by the handlers and the storage context.
//!
//! Both types double as request payloads: the item endpoints accept a full
//! `TodoItem` and the value endpoints accept a full `TodoValue`. Field names
//! are camelCase on the wire.

use serde::{Deserialize, Deserializer, Serialize};

/// A todo entry together with the values it owns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub is_complete: bool,
    /// Ordered by value id when loaded from storage.
    #[serde(default, alias = "todoItemValues", deserialize_with = "null_as_empty")]
    pub values: Vec<TodoValue>,
}

/// A numeric datum owned by exactly one item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoValue {
    pub id: i32,
    pub value: f64,
    /// Overwritten by the handlers with the owning item's id.
    #[serde(default)]
    pub todo_item_id: Option<i32>,
}

impl TodoItem {
    pub fn new(id: i32, name: impl Into<String>, is_complete: bool) -> Self {
        Self {
            id,
            name: name.into(),
            is_complete,
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: Vec<TodoValue>) -> Self {
        self.values = values;
        self
    }

    pub fn value(&self, value_id: i32) -> Option<&TodoValue> {
        self.values.iter().find(|v| v.id == value_id)
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

    pub fn owned_by(mut self, item_id: i32) -> Self {
        self.todo_item_id = Some(item_id);
        self
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<TodoValue>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<TodoValue>>::deserialize(deserializer)?.unwrap_or_default())
}
