//! Observed HTTP exchanges as reported by the traffic capture side.
//!
//! The JSON shape follows the capture agents: camelCase keys, `requestID` for the request id,
//! bodies base64 encoded and headers as a list of `{key, value}` pairs.

use serde::{Deserialize, Serialize};

/// One observed request/response exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination_namespace: String,
    pub request: TelemetryRequest,
    #[serde(rename = "requestID", default, skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    pub response: TelemetryResponse,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scheme: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_address: String,
}

impl Telemetry {
    pub fn new(request: TelemetryRequest, response: TelemetryResponse) -> Self {
        Self {
            request,
            response,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRequest {
    #[serde(default)]
    pub common: MessageCommon,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    pub method: String,
    /// Raw request target, possibly including a query string
    pub path: String,
}

impl TelemetryRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            common: MessageCommon::default(),
            host: String::new(),
            method: method.into(),
            path: path.into(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common.headers.push(Header::new(key, value));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.common.body = body.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    #[serde(default)]
    pub common: MessageCommon,
    pub status_code: String,
}

impl TelemetryResponse {
    pub fn new(status_code: impl Into<String>) -> Self {
        Self {
            common: MessageCommon::default(),
            status_code: status_code.into(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common.headers.push(Header::new(key, value));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.common.body = body.into();
        self
    }
}

/// Parts shared by requests and responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageCommon {
    #[serde(rename = "TruncatedBody", default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated_body: bool,
    #[serde(default, with = "base64_body", skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl MessageCommon {
    /// First header named `name`, compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    /// Lower-cased media type of the `content-type` header, without parameters
    #[must_use]
    pub fn media_type(&self) -> Option<String> {
        self.header("content-type")
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    /// `true` when a complete, non-empty body was captured
    #[must_use]
    pub fn has_body(&self) -> bool {
        !self.body.is_empty() && !self.truncated_body
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Split a request target into its path and optional query string
#[must_use]
pub fn path_and_query(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 body: {e}")))
    }
}
