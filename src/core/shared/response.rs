use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// The `{success: true, data, count?, message?}` envelope every route answers with.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Map<String, Value>,
}

impl ApiResponse {
    pub fn ok<T: Serialize>(data: T) -> Self {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(true));
        body.insert("data".into(), to_value(data));
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn created<T: Serialize>(data: T) -> Self {
        Self::ok(data).with_status(StatusCode::CREATED)
    }

    /// A list response; `count` is the number of items in `data`.
    pub fn list<T: Serialize>(items: Vec<T>) -> Self {
        let count = items.len();
        Self::ok(items).with("count", count)
    }

    pub fn message(message: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(true));
        body.insert("message".into(), Value::String(message.into()));
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        self.with("message", message.into())
    }

    pub fn with<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.body.insert(key.to_string(), to_value(value));
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| json!({ "serializationError": e.to_string() }))
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(Value::Object(self.body))).into_response()
    }
}
