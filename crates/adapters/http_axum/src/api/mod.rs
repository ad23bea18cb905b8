//! JSON handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod generic;
#[allow(clippy::missing_errors_doc)]
pub mod hub;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

/// `{status: "OK", ...}` success body.
#[derive(Debug, Default)]
pub struct OkReply(Map<String, Value>);

impl OkReply {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Carry a vendor reply: objects are merged into the body, anything
    /// else is kept under `result`.
    #[must_use]
    pub fn merge(self, reply: Option<Value>) -> Self {
        match reply {
            None | Some(Value::Null) => self,
            Some(Value::Object(fields)) => fields
                .into_iter()
                .fold(self, |acc, (key, value)| acc.with(&key, value)),
            Some(other) => self.with("result", other),
        }
    }
}

impl IntoResponse for OkReply {
    fn into_response(self) -> Response {
        let mut body = Map::with_capacity(self.0.len() + 1);
        body.insert("status".to_string(), Value::from("OK"));
        for (key, value) in self.0 {
            body.entry(key).or_insert(value);
        }
        Json(Value::Object(body)).into_response()
    }
}
