//! Resource handlers for `/api/items` and its nested `/values` collection.

pub mod items;
pub mod values;
