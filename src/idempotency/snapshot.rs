//! Response snapshots: a complete, replayable copy of a [`Response`].
//!
//! The wire form is a JSON object with the status as a number, headers as an
//! ordered list of `[name, value]` pairs (original casing and duplicates kept),
//! the body as standard base64, and the keep-alive flag.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::IdempotencyError;
use crate::http::{Body, Headers, Response, StatusCode};

/// Everything a client can observe about a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    status: StatusCode,
    headers: Headers,
    #[serde(with = "base64_body")]
    body: Bytes,
    keep_alive: bool,
}

impl ResponseSnapshot {
    /// Copies every observable field of `response`.
    ///
    /// # Errors
    ///
    /// [`IdempotencyError::SnapshotEncoding`] if the body is streaming.
    pub fn capture(response: &Response) -> Result<Self, IdempotencyError> {
        let body = match response.body_ref() {
            Body::Full(bytes) => bytes.clone(),
            Body::Streaming(_) => {
                return Err(IdempotencyError::SnapshotEncoding(
                    "streaming bodies are consumed as they are sent".to_owned(),
                ));
            }
        };

        Ok(Self {
            status: response.status(),
            headers: response.headers().clone(),
            body,
            keep_alive: response.is_keep_alive(),
        })
    }

    pub fn encode(&self) -> Result<Bytes, IdempotencyError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| IdempotencyError::SnapshotEncoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IdempotencyError> {
        serde_json::from_slice(bytes).map_err(IdempotencyError::SnapshotDecoding)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Overwrites every field of `response` with this snapshot, discarding
    /// whatever status, headers, and body it held.
    pub fn apply_to(self, response: &mut Response) {
        let Self {
            status,
            headers,
            body,
            keep_alive,
        } = self;

        response.set_status(status);
        response.set_headers(headers);
        response.set_body(body);
        response.set_keep_alive(keep_alive);
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::default();
        self.apply_to(&mut response);
        response
    }
}

/// Snapshot `response` and serialize it.
pub fn encode(response: &Response) -> Result<Bytes, IdempotencyError> {
    ResponseSnapshot::capture(response)?.encode()
}

/// Rebuild a response from [`encode`]d bytes.
pub fn decode(bytes: &[u8]) -> Result<Response, IdempotencyError> {
    Ok(ResponseSnapshot::decode(bytes)?.into_response())
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}
