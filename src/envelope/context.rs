//! Per-request state shared between the dispatcher and one handler.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::envelope::codec::{RequestDocument, ResponseEnvelope};
use crate::envelope::{NO_ACTION, SUCCESS_MSG};
use crate::error::ValidationError;

/// Body field carrying the client-chosen request id.
pub const FIELD_REQUEST_ID: &str = "requestId";
/// Body field carrying the client send time in epoch milliseconds.
pub const FIELD_REQUEST_MS: &str = "requestMs";
/// Body field carrying the logical sub-operation.
pub const FIELD_ACTION: &str = "action";

/// Mutable state of a single request.
///
/// Created fresh by the dispatcher for each request and dropped once the
/// envelope has been written. Handlers read [`request`](Self::request) and
/// write output through [`set_data`](Self::set_data) / [`set_rsp`](Self::set_rsp)
/// and error state through [`set_err_msg`](Self::set_err_msg) / [`reject`](Self::reject).
#[derive(Debug)]
pub struct RequestContext {
    request: RequestDocument,
    data: Option<Value>,
    err_code: u32,
    err_msg: String,
    request_id: String,
    enter_ms: u64,
    path: String,
    span: tracing::Span,
}

impl RequestContext {
    /// Create a context for a decoded request that reached `path` at `enter_ms`.
    pub fn new(path: impl Into<String>, request: RequestDocument, enter_ms: u64) -> Self {
        Self {
            request,
            data: None,
            err_code: 0,
            err_msg: SUCCESS_MSG.to_string(),
            request_id: String::new(),
            enter_ms,
            path: path.into(),
            span: tracing::Span::none(),
        }
    }

    /// Attach the tracing span handlers should log under.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// Bind the request id once it has been validated.
    pub fn set_request_id(&mut self, request_id: impl Into<String>) {
        self.request_id = request_id.into();
        self.span.record("request_id", self.request_id.as_str());
    }

    /// The decoded request body.
    pub fn request(&self) -> &RequestDocument {
        &self.request
    }

    /// A string field of the request body, if present and a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.request.get(key).and_then(Value::as_str)
    }

    /// Decode the request body into a handler-specific type.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.request.clone()))
    }

    /// Client send time, coerced with [`coerce_u64`]; 0 when absent.
    pub fn request_ms(&self) -> u64 {
        self.request.get(FIELD_REQUEST_MS).map(coerce_u64).unwrap_or(0)
    }

    /// The body's `action` field, or the no-action sentinel when there is none.
    pub fn action(&self) -> &str {
        self.str_field(FIELD_ACTION).unwrap_or(NO_ACTION)
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn enter_ms(&self) -> u64 {
        self.enter_ms
    }

    /// Matched route template, e.g. `/api/user/{id}`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Store the output value emitted as `data`.
    pub fn set_data(&mut self, data: Value) {
        self.data = Some(data);
    }

    /// Serialize `rsp` into the `data` slot.
    pub fn set_rsp<T: Serialize>(&mut self, rsp: &T) -> Result<(), serde_json::Error> {
        self.data = Some(serde_json::to_value(rsp)?);
        Ok(())
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn set_err_msg(&mut self, err_code: u32, err_msg: impl Into<String>) {
        self.err_code = err_code;
        self.err_msg = err_msg.into();
    }

    /// Record a handler-side validation failure.
    pub fn reject(&mut self, err: ValidationError) {
        self.set_err_msg(err.code, err.message);
    }

    pub fn err_code(&self) -> u32 {
        self.err_code
    }

    pub fn err_msg(&self) -> &str {
        &self.err_msg
    }

    /// Build the envelope from whatever the context holds right now.
    pub fn to_envelope(&self) -> ResponseEnvelope {
        if self.err_code == 0 {
            ResponseEnvelope::success(self.request_id.clone(), self.data.clone())
        } else {
            ResponseEnvelope::error(
                self.request_id.clone(),
                self.err_code,
                self.err_msg.clone(),
                self.data.clone(),
            )
        }
    }

    /// Consume the context into its envelope.
    pub fn into_envelope(self) -> ResponseEnvelope {
        if self.err_code == 0 {
            ResponseEnvelope::success(self.request_id, self.data)
        } else {
            ResponseEnvelope::error(self.request_id, self.err_code, self.err_msg, self.data)
        }
    }
}

/// Current wall clock time in epoch milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Permissive conversion of a JSON value to `u64`.
///
/// - non-negative integers pass through
/// - non-negative floats are truncated
/// - strings holding a non-negative integer (or an integral float) are parsed
/// - `true` is 1
/// - everything else, negatives included, is 0
pub fn coerce_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                        .map(|f| f as u64)
                })
                .unwrap_or(0)
        }
        Value::Bool(b) => u64::from(*b),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn ctx(body: Value) -> RequestContext {
        let Value::Object(doc) = body else {
            panic!("test body must be an object");
        };
        RequestContext::new("/api/test", doc, 1_000)
    }

    #[test]
    fn test_coerce_u64() {
        assert_eq!(coerce_u64(&json!(1598848960000u64)), 1598848960000);
        assert_eq!(coerce_u64(&json!(12.9)), 12);
        assert_eq!(coerce_u64(&json!(-5)), 0);
        assert_eq!(coerce_u64(&json!(-5.5)), 0);
        assert_eq!(coerce_u64(&json!("42")), 42);
        assert_eq!(coerce_u64(&json!(" 42 ")), 42);
        assert_eq!(coerce_u64(&json!("42.0")), 42);
        assert_eq!(coerce_u64(&json!("42.5")), 0);
        assert_eq!(coerce_u64(&json!("abc")), 0);
        assert_eq!(coerce_u64(&json!(true)), 1);
        assert_eq!(coerce_u64(&json!(false)), 0);
        assert_eq!(coerce_u64(&json!(null)), 0);
        assert_eq!(coerce_u64(&json!([1])), 0);
        assert_eq!(coerce_u64(&json!({"ms": 1})), 0);
    }

    #[test]
    fn test_request_ms_defaults_to_zero() {
        assert_eq!(ctx(json!({"requestId": "r"})).request_ms(), 0);
        assert_eq!(ctx(json!({"requestId": "r", "requestMs": "soon"})).request_ms(), 0);
        assert_eq!(ctx(json!({"requestId": "r", "requestMs": 900})).request_ms(), 900);
    }

    #[test]
    fn test_action_falls_back_to_sentinel() {
        assert_eq!(ctx(json!({})).action(), NO_ACTION);
        assert_eq!(ctx(json!({"action": 7})).action(), NO_ACTION);
        assert_eq!(ctx(json!({"action": "mod"})).action(), "mod");
    }

    #[test]
    fn test_fresh_context_is_success() {
        let mut c = ctx(json!({"requestId": "r1"}));
        c.set_request_id("r1");
        let env = c.into_envelope();
        assert_eq!(env, ResponseEnvelope::success("r1", None));
    }

    #[test]
    fn test_error_keeps_partial_data() {
        let mut c = ctx(json!({}));
        c.set_request_id("r2");
        c.set_data(json!({"partial": 1}));
        c.set_err_msg(10002, "later failure");

        let env = c.to_envelope();
        assert_eq!(env.err_code, 10002);
        assert_eq!(env.err_msg, "later failure");
        assert_eq!(env.data, Some(json!({"partial": 1})));
    }

    #[test]
    fn test_reject_uses_validation_error() {
        let mut c = ctx(json!({}));
        c.reject(ValidationError::new(10001, "para err"));
        assert_eq!(c.err_code(), 10001);
        assert_eq!(c.err_msg(), "para err");
    }

    #[test]
    fn test_decode_payload() {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Payload {
            user_id: String,
            #[serde(default)]
            nickname: Option<String>,
        }

        let c = ctx(json!({"requestId": "r", "userId": "u1", "extra": [1, 2]}));
        let payload: Payload = c.decode_payload().unwrap();
        assert_eq!(payload.user_id, "u1");
        assert!(payload.nickname.is_none());

        let c = ctx(json!({"requestId": "r", "userId": 5}));
        assert!(c.decode_payload::<Payload>().is_err());
    }
}
