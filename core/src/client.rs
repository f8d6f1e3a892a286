//! Request builder and response parser for the todo API.
//!
//! # Design
//! `TodoClient` holds only a `base_url`. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes the matching `HttpResponse`, so the caller owns all I/O.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{TodoItem, TodoValue, ValueUpdate};

/// Stateless client for `/api/items` and its nested values.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers: Vec::new(),
            body: None,
        }
    }

    fn json_request<T: Serialize>(&self, method: HttpMethod, path: &str, input: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
            ..self.request(method, path)
        })
    }

    // --- items ---

    pub fn build_list_items(&self) -> HttpRequest {
        self.request(HttpMethod::Get, "/api/items")
    }

    /// List items with query options, e.g. `[("$filter", "isComplete eq true")]`.
    pub fn build_query_items(&self, options: &[(&str, &str)]) -> HttpRequest {
        let mut req = self.build_list_items();
        if !options.is_empty() {
            req.path.push('?');
            req.path.push_str(&encode_query(options));
        }
        req
    }

    pub fn build_get_item(&self, id: i32) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/api/items/{id}"))
    }

    pub fn build_create_item(&self, item: &TodoItem) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, "/api/items", item)
    }

    pub fn build_update_item(&self, id: i32, item: &TodoItem) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/api/items/{id}"), item)
    }

    pub fn build_delete_item(&self, id: i32) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/api/items/{id}"))
    }

    pub fn parse_list_items(&self, response: HttpResponse) -> Result<Vec<TodoItem>, ApiError> {
        parse_json(&response, 200)
    }

    pub fn parse_get_item(&self, response: HttpResponse) -> Result<TodoItem, ApiError> {
        parse_json(&response, 200)
    }

    pub fn parse_create_item(&self, response: HttpResponse) -> Result<TodoItem, ApiError> {
        parse_json(&response, 201)
    }

    pub fn parse_update_item(&self, response: HttpResponse) -> Result<TodoItem, ApiError> {
        parse_json(&response, 200)
    }

    pub fn parse_delete_item(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, 204)
    }

    // --- values ---

    pub fn build_list_values(&self, item_id: i32) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/api/items/{item_id}/values"))
    }

    pub fn build_get_value(&self, item_id: i32, value_id: i32) -> HttpRequest {
        self.request(HttpMethod::Get, &format!("/api/items/{item_id}/values/{value_id}"))
    }

    pub fn build_add_value(&self, item_id: i32, value: &TodoValue) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Post, &format!("/api/items/{item_id}/values"), value)
    }

    pub fn build_update_value(&self, item_id: i32, value: &TodoValue) -> Result<HttpRequest, ApiError> {
        self.json_request(HttpMethod::Put, &format!("/api/items/{item_id}/values"), value)
    }

    pub fn build_delete_value(&self, item_id: i32, value_id: i32) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/api/items/{item_id}/values/{value_id}"))
    }

    pub fn build_delete_all_values(&self, item_id: i32) -> HttpRequest {
        self.request(HttpMethod::Delete, &format!("/api/items/{item_id}/values"))
    }

    pub fn parse_list_values(&self, response: HttpResponse) -> Result<Vec<TodoValue>, ApiError> {
        parse_json(&response, 200)
    }

    pub fn parse_get_value(&self, response: HttpResponse) -> Result<f64, ApiError> {
        parse_json(&response, 200)
    }

    pub fn parse_add_value(&self, response: HttpResponse) -> Result<Vec<TodoValue>, ApiError> {
        parse_json(&response, 201)
    }

    /// `200` carries a confirmation message; `201` means the value was added
    /// and carries the item's full value list.
    pub fn parse_update_value(&self, response: HttpResponse) -> Result<ValueUpdate, ApiError> {
        if response.status == 201 {
            return parse_json(&response, 201).map(ValueUpdate::Added);
        }
        parse_json(&response, 200).map(ValueUpdate::Updated)
    }

    pub fn parse_delete_value(&self, response: HttpResponse) -> Result<String, ApiError> {
        parse_json(&response, 200)
    }

    pub fn parse_delete_all_values(&self, response: HttpResponse) -> Result<String, ApiError> {
        parse_json(&response, 200)
    }
}

/// Map non-success status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

fn parse_json<T: DeserializeOwned>(response: &HttpResponse, expected: u16) -> Result<T, ApiError> {
    check_status(response, expected)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Unreserved characters plus `$`, which stays literal so option names read
/// as written.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$');

fn encode_query(options: &[(&str, &str)]) -> String {
    options
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                utf8_percent_encode(key, QUERY_ENCODE_SET),
                utf8_percent_encode(value, QUERY_ENCODE_SET)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
