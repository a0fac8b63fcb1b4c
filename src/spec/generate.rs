//! Conversion of one telemetry sample into a Swagger operation.
//!
//! [`OperationGenerator`] is the seam the learning layer calls through;
//! [`TelemetryOperationGenerator`] is the default implementation. Schema inference from JSON
//! bodies lives in [`schema_from_json`]; it only looks at the first element of arrays.

use super::error::GenerateError;
use super::telemetry::{path_and_query, MessageCommon, Telemetry, TelemetryResponse};
use super::types::{
    HttpMethod, Operation, Parameter, ParameterLocation, Response, ResponseHeader,
    SecurityDefinitions, SecurityScheme,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Security scheme registered for `Authorization: Basic ...`
pub const BASIC_AUTH_SCHEME: &str = "BasicAuth";
/// Security scheme registered for `Authorization: Bearer ...`
pub const OAUTH2_SCHEME: &str = "OAuth2";
const OAUTH2_AUTHORIZATION_URL: &str = "https://example.com/oauth/authorize";

const MEDIA_TYPE_FORM: &str = "application/x-www-form-urlencoded";
const MEDIA_TYPE_MULTIPART: &str = "multipart/form-data";

/// Request headers that never become header parameters
const IGNORED_REQUEST_HEADERS: &[&str] = &[
    "accept",
    "accept-encoding",
    "authorization",
    "connection",
    "content-length",
    "content-type",
    "cookie",
    "host",
    "keep-alive",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Response headers that are not worth documenting
const IGNORED_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "content-length",
    "content-type",
    "date",
    "keep-alive",
    "set-cookie",
    "trailer",
    "transfer-encoding",
];

#[allow(clippy::expect_used)]
static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("UUID regex should be valid")
});

#[allow(clippy::expect_used)]
static DATE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})$")
        .expect("date-time regex should be valid")
});

/// Produces a structured operation from one telemetry sample
///
/// Implementations may register security schemes they discover in `security_definitions`.
/// On error the caller discards everything the generator wrote there.
pub trait OperationGenerator: Send + Sync {
    fn generate(
        &self,
        telemetry: &Telemetry,
        security_definitions: &mut SecurityDefinitions,
    ) -> Result<Operation, GenerateError>;
}

/// Default generator describing query strings, headers, bodies and responses
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryOperationGenerator;

impl OperationGenerator for TelemetryOperationGenerator {
    fn generate(
        &self,
        telemetry: &Telemetry,
        security_definitions: &mut SecurityDefinitions,
    ) -> Result<Operation, GenerateError> {
        let request = &telemetry.request;
        let method: HttpMethod = request
            .method
            .parse()
            .map_err(|_| GenerateError::UnsupportedMethod(request.method.clone()))?;

        let mut operation = Operation::default();

        if let (_, Some(query)) = path_and_query(&request.path) {
            for (name, values) in group_pairs(query) {
                operation
                    .parameters
                    .push(primitive_parameter(name, ParameterLocation::Query, &values));
            }
        }

        add_request_headers(&mut operation, &request.common, security_definitions);
        add_request_body(&mut operation, method, &request.common)?;
        add_response(&mut operation, &telemetry.response)?;

        Ok(operation)
    }
}

fn add_request_headers(
    operation: &mut Operation,
    common: &MessageCommon,
    security_definitions: &mut SecurityDefinitions,
) {
    for header in &common.headers {
        let key = header.key.to_ascii_lowercase();
        if key == "authorization" {
            add_authorization(operation, &header.value, security_definitions);
            continue;
        }
        // HTTP/2 pseudo headers such as `:authority`
        if key.starts_with(':') || IGNORED_REQUEST_HEADERS.contains(&key.as_str()) {
            continue;
        }
        let already_declared = operation
            .parameters
            .iter()
            .any(|p| p.location == ParameterLocation::Header && p.name.eq_ignore_ascii_case(&key));
        if !already_declared {
            operation.parameters.push(primitive_parameter(
                header.key.clone(),
                ParameterLocation::Header,
                std::slice::from_ref(&header.value),
            ));
        }
    }
}

fn add_authorization(
    operation: &mut Operation,
    value: &str,
    security_definitions: &mut SecurityDefinitions,
) {
    let scheme = value.split_whitespace().next().unwrap_or_default();
    let (name, definition) = if scheme.eq_ignore_ascii_case("basic") {
        (BASIC_AUTH_SCHEME, SecurityScheme::basic())
    } else if scheme.eq_ignore_ascii_case("bearer") {
        (
            OAUTH2_SCHEME,
            SecurityScheme::oauth2_implicit(OAUTH2_AUTHORIZATION_URL),
        )
    } else {
        return;
    };

    security_definitions
        .entry(name.to_string())
        .or_insert(definition);
    let requirement = BTreeMap::from([(name.to_string(), Vec::new())]);
    if !operation.security.contains(&requirement) {
        operation.security.push(requirement);
    }
}

fn add_request_body(
    operation: &mut Operation,
    method: HttpMethod,
    common: &MessageCommon,
) -> Result<(), GenerateError> {
    if !common.has_body() {
        return Ok(());
    }
    let media_type = common.media_type().unwrap_or_default();

    if is_json_media_type(&media_type) {
        let body: Value =
            serde_json::from_slice(&common.body).map_err(|e| GenerateError::InvalidJsonBody {
                part: "request",
                message: e.to_string(),
            })?;
        operation
            .parameters
            .push(Parameter::body("body", schema_from_json(&body)));
    } else if media_type == MEDIA_TYPE_FORM && method != HttpMethod::Get {
        let raw = String::from_utf8_lossy(&common.body);
        for (name, values) in group_pairs(&raw) {
            operation
                .parameters
                .push(primitive_parameter(name, ParameterLocation::FormData, &values));
        }
    } else if media_type == MEDIA_TYPE_MULTIPART && method != HttpMethod::Get {
        let boundary = common.header("content-type").and_then(multipart_boundary);
        if let Some(boundary) = boundary {
            operation
                .parameters
                .extend(multipart_parameters(&common.body, &boundary));
        }
    } else {
        return Err(GenerateError::UnsupportedContentType(media_type));
    }

    operation.consumes.push(media_type);
    Ok(())
}

fn add_response(operation: &mut Operation, response: &TelemetryResponse) -> Result<(), GenerateError> {
    let code = response.status_code.trim();
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|c| http::StatusCode::from_u16(c).ok())
        .ok_or_else(|| GenerateError::InvalidStatusCode(response.status_code.clone()))?;

    let mut described = Response {
        description: status
            .canonical_reason()
            .unwrap_or("response")
            .to_string(),
        ..Response::default()
    };

    let common = &response.common;
    if common.has_body() {
        if let Some(media_type) = common.media_type() {
            if is_json_media_type(&media_type) {
                let body: Value = serde_json::from_slice(&common.body).map_err(|e| {
                    GenerateError::InvalidJsonBody {
                        part: "response",
                        message: e.to_string(),
                    }
                })?;
                described.schema = Some(schema_from_json(&body));
            }
            operation.produces.push(media_type);
        }
    }

    for header in &common.headers {
        let key = header.key.to_ascii_lowercase();
        if key.starts_with(':') || IGNORED_RESPONSE_HEADERS.contains(&key.as_str()) {
            continue;
        }
        let (kind, format) = infer_primitive(&header.value);
        described.headers.entry(key).or_insert(ResponseHeader {
            kind: kind.to_string(),
            format: format.map(str::to_string),
            description: None,
        });
    }

    operation
        .responses
        .insert(status.as_u16().to_string(), described);
    Ok(())
}

/// One part of a `multipart/form-data` body
struct FormPart {
    name: String,
    is_file: bool,
    value: String,
}

fn multipart_boundary(content_type: &str) -> Option<String> {
    header_param(content_type, "boundary").filter(|b| !b.is_empty())
}

/// `key=value` (optionally quoted) parameter of a `;`-separated header value
fn header_param(header: &str, key: &str) -> Option<String> {
    header.split(';').skip(1).find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        k.trim()
            .eq_ignore_ascii_case(key)
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

fn multipart_parts(body: &[u8], boundary: &str) -> Vec<FormPart> {
    let text = String::from_utf8_lossy(body);
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    for chunk in text.split(delimiter.as_str()).skip(1) {
        // closing delimiter
        if chunk.starts_with("--") {
            break;
        }
        let chunk = chunk
            .strip_prefix("\r\n")
            .or_else(|| chunk.strip_prefix('\n'))
            .unwrap_or(chunk);
        let Some((head, value)) = chunk
            .split_once("\r\n\r\n")
            .or_else(|| chunk.split_once("\n\n"))
        else {
            continue;
        };
        let disposition = head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("content-disposition")
                .then_some(value)
        });
        let Some(name) = disposition.and_then(|d| header_param(d, "name")) else {
            continue;
        };
        let value = value
            .strip_suffix("\r\n")
            .or_else(|| value.strip_suffix('\n'))
            .unwrap_or(value);
        parts.push(FormPart {
            name,
            is_file: disposition.and_then(|d| header_param(d, "filename")).is_some(),
            value: value.to_string(),
        });
    }
    parts
}

/// `formData` parameters of a multipart body; parts carrying a filename become `file`s
fn multipart_parameters(body: &[u8], boundary: &str) -> Vec<Parameter> {
    let mut files: Vec<String> = Vec::new();
    let mut fields: Vec<(String, Vec<String>)> = Vec::new();
    for part in multipart_parts(body, boundary) {
        if part.is_file {
            if !files.contains(&part.name) {
                files.push(part.name);
            }
            continue;
        }
        match fields.iter_mut().find(|(name, _)| *name == part.name) {
            Some((_, values)) => values.push(part.value),
            None => fields.push((part.name, vec![part.value])),
        }
    }

    let mut params: Vec<Parameter> = fields
        .into_iter()
        .filter(|(name, _)| !files.contains(name))
        .map(|(name, values)| primitive_parameter(name, ParameterLocation::FormData, &values))
        .collect();
    params.extend(
        files
            .into_iter()
            .map(|name| Parameter::simple(name, ParameterLocation::FormData, "file")),
    );
    params
}

/// Group `k=v&k=w` pairs by key, keeping first-seen key order
fn group_pairs(encoded: &str) -> Vec<(String, Vec<String>)> {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
        if key.is_empty() {
            continue;
        }
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }
    grouped
}

/// Parameter for a key observed with `values`; repeated keys become `multi` arrays
fn primitive_parameter(
    name: String,
    location: ParameterLocation,
    values: &[String],
) -> Parameter {
    let first = values.first().map(String::as_str).unwrap_or_default();
    let (kind, format) = infer_primitive(first);

    if values.len() > 1 {
        let mut items = json!({ "type": kind });
        if let (Some(format), Some(obj)) = (format, items.as_object_mut()) {
            obj.insert("format".to_string(), Value::String(format.to_string()));
        }
        let mut param = Parameter::simple(name, location, "array");
        param.items = Some(items);
        param.collection_format = Some("multi".to_string());
        return param;
    }

    Parameter::simple(name, location, kind).with_format(format)
}

/// Primitive Swagger type (and format) a raw string value most likely has
#[must_use]
pub fn infer_primitive(value: &str) -> (&'static str, Option<&'static str>) {
    if value.parse::<i64>().is_ok() {
        return ("integer", None);
    }
    let numeric = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric && value.parse::<f64>().is_ok() {
        return ("number", None);
    }
    if value == "true" || value == "false" {
        return ("boolean", None);
    }
    ("string", string_format(value))
}

fn string_format(value: &str) -> Option<&'static str> {
    if UUID_RE.is_match(value) {
        Some("uuid")
    } else if DATE_TIME_RE.is_match(value) {
        Some("date-time")
    } else {
        None
    }
}

fn is_json_media_type(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json")
}

/// Infer a Swagger schema from a JSON value
///
/// Arrays are described by their first element; an empty array gets an untyped `items`
/// schema that a later merge can fill in.
#[must_use]
pub fn schema_from_json(value: &Value) -> Value {
    match value {
        Value::Null => json!({}),
        Value::Bool(_) => json!({ "type": "boolean" }),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            json!({ "type": "integer", "format": "int64" })
        }
        Value::Number(_) => json!({ "type": "number" }),
        Value::String(s) => match string_format(s) {
            Some(format) => json!({ "type": "string", "format": format }),
            None => json!({ "type": "string" }),
        },
        Value::Array(items) => {
            let items = items.first().map(schema_from_json).unwrap_or_else(|| json!({}));
            json!({ "type": "array", "items": items })
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                return json!({ "type": "object" });
            }
            let properties: Map<String, Value> = fields
                .iter()
                .map(|(k, v)| (k.clone(), schema_from_json(v)))
                .collect();
            json!({ "type": "object", "properties": properties })
        }
    }
}
