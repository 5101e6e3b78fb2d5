//! Client for envelope servers.

use reqwest::Client;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::envelope::context::{now_ms, FIELD_ACTION, FIELD_REQUEST_ID, FIELD_REQUEST_MS};
use crate::envelope::ResponseEnvelope;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("Payload must be a JSON object")]
    PayloadNotObject,
}

/// One envelope call.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeRequest {
    /// Route path, e.g. `/api/userinfo`.
    pub path: String,
    /// Body `action`; omitted when `None`.
    pub action: Option<String>,
    /// Handler-specific fields merged into the body.
    pub payload: Map<String, Value>,
    /// Explicit request id; a UUID v4 is generated when `None`.
    pub request_id: Option<String>,
}

impl EnvelopeRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Use the fields of `payload`, which must be a JSON object.
    pub fn payload(mut self, payload: Value) -> Result<Self, ClientError> {
        match payload {
            Value::Object(map) => {
                self.payload = map;
                Ok(self)
            }
            Value::Null => Ok(self),
            _ => Err(ClientError::PayloadNotObject),
        }
    }

    /// Build the JSON body sent to the server, stamped with `request_ms`.
    pub fn to_body(&self, request_ms: u64) -> Value {
        let mut body = self.payload.clone();
        let request_id = self
            .request_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        body.insert(FIELD_REQUEST_ID.to_string(), Value::String(request_id));
        body.insert(FIELD_REQUEST_MS.to_string(), Value::from(request_ms));
        if let Some(action) = &self.action {
            body.insert(FIELD_ACTION.to_string(), Value::String(action.clone()));
        }
        Value::Object(body)
    }
}

/// Sends envelope requests to one server.
#[derive(Debug, Clone)]
pub struct EnvelopeClient {
    client: Client,
    base_url: String,
}

impl EnvelopeClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// POST `request` and decode the envelope.
    pub async fn call(&self, request: &EnvelopeRequest) -> Result<ResponseEnvelope, ClientError> {
        let path = request.path.trim_start_matches('/');
        let resp = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(&request.to_body(now_ms()))
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str::<ResponseEnvelope>(&text)?)
    }
}
