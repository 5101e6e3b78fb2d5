//! Request decoding and response envelope encoding.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::SUCCESS_MSG;
use crate::error::DecodeError;

/// Untyped request body: a JSON object keyed by field name.
pub type RequestDocument = Map<String, Value>;

/// The fixed response shape sent for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub request_id: String,
    pub err_code: u32,
    pub err_msg: String,
    pub data: Option<Value>,
}

impl ResponseEnvelope {
    /// Successful envelope carrying `data`.
    pub fn success(request_id: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            request_id: request_id.into(),
            err_code: 0,
            err_msg: SUCCESS_MSG.to_string(),
            data,
        }
    }

    /// Error envelope. `data` is kept so partial handler output is still emitted.
    pub fn error(
        request_id: impl Into<String>,
        err_code: u32,
        err_msg: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            err_code,
            err_msg: err_msg.into(),
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.err_code == 0
    }
}

/// Decode a raw body into a request document.
///
/// Malformed, truncated and non-object bodies all fail with [`DecodeError::Parse`].
pub fn decode(raw: &[u8]) -> Result<RequestDocument, DecodeError> {
    Ok(serde_json::from_slice::<RequestDocument>(raw)?)
}

/// Serialize an envelope to JSON bytes.
pub fn encode(envelope: &ResponseEnvelope) -> Vec<u8> {
    match serde_json::to_vec(envelope) {
        Ok(bytes) => bytes,
        Err(e) => {
            // Only reachable with a non-string-keyed map smuggled into `data`.
            tracing::error!(request_id = %envelope.request_id, error = %e, "Failed to encode envelope data");
            let fallback = ResponseEnvelope::error(
                envelope.request_id.clone(),
                envelope.err_code,
                envelope.err_msg.clone(),
                None,
            );
            serde_json::to_vec(&fallback).unwrap_or_default()
        }
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            encode(&self),
        )
            .into_response()
    }
}
