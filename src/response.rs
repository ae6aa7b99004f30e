use std::borrow::Cow;

use bytes::Bytes;
use reqwest::{header::HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{RequestError, Result};

/// Materialized result of one successful exchange.
///
/// Status, headers and body always come from the same exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct ResponseCapture {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ResponseCapture {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parses the body as a top-level JSON object.
    pub fn decode_json(&self) -> Result<Map<String, Value>> {
        self.json()
    }

    /// Parses the body into any deserializable type.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(RequestError::Deserialize)
    }
}
