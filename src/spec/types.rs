use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Security requirement of an operation: scheme name → required scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Security schemes keyed by name
pub type SecurityDefinitions = BTreeMap<String, SecurityScheme>;

/// Schema definitions keyed by name (the `definitions` section)
pub type Definitions = BTreeMap<String, Value>;

/// HTTP methods a Swagger 2.0 path item can describe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
}

/// Set of methods defined for one path template
pub type MethodSet = BTreeSet<HttpMethod>;

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Error returned when a method has no Swagger 2.0 path item slot (e.g. `TRACE`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMethod(pub String);

impl fmt::Display for UnsupportedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported HTTP method '{}'", self.0)
    }
}

impl std::error::Error for UnsupportedMethod {}

impl TryFrom<&http::Method> for HttpMethod {
    type Error = UnsupportedMethod;

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        match *method {
            http::Method::GET => Ok(HttpMethod::Get),
            http::Method::PUT => Ok(HttpMethod::Put),
            http::Method::POST => Ok(HttpMethod::Post),
            http::Method::DELETE => Ok(HttpMethod::Delete),
            http::Method::OPTIONS => Ok(HttpMethod::Options),
            http::Method::HEAD => Ok(HttpMethod::Head),
            http::Method::PATCH => Ok(HttpMethod::Patch),
            _ => Err(UnsupportedMethod(method.to_string())),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    /// Parses a method name case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = http::Method::from_bytes(s.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| UnsupportedMethod(s.to_string()))?;
        HttpMethod::try_from(&method)
    }
}

/// Where a parameter is carried in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    FormData,
    Body,
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::FormData => write!(f, "formData"),
            ParameterLocation::Body => write!(f, "body"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Only for `in: body`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Primitive type for every location other than `body`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_format: Option<String>,
}

impl Parameter {
    /// Non-body parameter of a primitive type
    pub fn simple(
        name: impl Into<String>,
        location: ParameterLocation,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location,
            description: None,
            required: location == ParameterLocation::Path,
            schema: None,
            kind: Some(kind.into()),
            format: None,
            items: None,
            collection_format: None,
        }
    }

    /// `in: body` parameter carrying `schema`
    pub fn body(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            location: ParameterLocation::Body,
            description: None,
            required: false,
            schema: Some(schema),
            kind: None,
            format: None,
            items: None,
            collection_format: None,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: Option<&str>) -> Self {
        self.format = format.map(str::to_string);
        self
    }

    /// `true` when `other` describes the same parameter slot
    ///
    /// Header names compare case-insensitively.
    #[must_use]
    pub fn same_slot(&self, other: &Parameter) -> bool {
        self.location == other.location
            && match self.location {
                ParameterLocation::Header => self.name.eq_ignore_ascii_case(&other.name),
                _ => self.name == other.name,
            }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, ResponseHeader>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    /// Keyed by status code (or `default`)
    #[serde(default)]
    pub responses: BTreeMap<String, Response>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

impl Operation {
    /// Parameter at `(name, location)`, if declared
    #[must_use]
    pub fn parameter(&self, name: &str, location: ParameterLocation) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| {
                p.location == location
                    && match location {
                        ParameterLocation::Header => p.name.eq_ignore_ascii_case(name),
                        _ => p.name == name,
                    }
            })
    }
}

/// Operations of one path template
///
/// Methods are explicit slots, matching the Swagger 2.0 object; unknown keys (extensions,
/// `$ref`) are ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    /// Parameters shared by every operation of this path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
}

impl PathItem {
    fn slot(&self, method: HttpMethod) -> &Option<Operation> {
        match method {
            HttpMethod::Get => &self.get,
            HttpMethod::Put => &self.put,
            HttpMethod::Post => &self.post,
            HttpMethod::Delete => &self.delete,
            HttpMethod::Options => &self.options,
            HttpMethod::Head => &self.head,
            HttpMethod::Patch => &self.patch,
        }
    }

    fn slot_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Patch => &mut self.patch,
        }
    }

    #[must_use]
    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        self.slot(method).as_ref()
    }

    pub fn set_operation(&mut self, method: HttpMethod, operation: Operation) {
        *self.slot_mut(method) = Some(operation);
    }

    /// Defined operations in a fixed method order
    pub fn operations(&self) -> impl Iterator<Item = (HttpMethod, &Operation)> {
        HttpMethod::ALL
            .into_iter()
            .filter_map(move |m| self.operation(m).map(|op| (m, op)))
    }

    /// Mutable access to every defined operation
    pub fn operations_mut(&mut self) -> impl Iterator<Item = (HttpMethod, &mut Operation)> {
        [
            (HttpMethod::Get, &mut self.get),
            (HttpMethod::Put, &mut self.put),
            (HttpMethod::Post, &mut self.post),
            (HttpMethod::Delete, &mut self.delete),
            (HttpMethod::Options, &mut self.options),
            (HttpMethod::Head, &mut self.head),
            (HttpMethod::Patch, &mut self.patch),
        ]
        .into_iter()
        .filter_map(|(m, slot)| slot.as_mut().map(|op| (m, op)))
    }

    #[must_use]
    pub fn methods(&self) -> MethodSet {
        self.operations().map(|(m, _)| m).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecuritySchemeType {
    #[serde(rename = "basic")]
    Basic,
    #[serde(rename = "apiKey")]
    ApiKey,
    #[serde(rename = "oauth2")]
    OAuth2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub kind: SecuritySchemeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Header or query parameter name for `apiKey`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<BTreeMap<String, String>>,
}

impl SecurityScheme {
    #[must_use]
    pub fn basic() -> Self {
        Self {
            kind: SecuritySchemeType::Basic,
            description: None,
            name: None,
            location: None,
            flow: None,
            authorization_url: None,
            token_url: None,
            scopes: None,
        }
    }

    pub fn api_key(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind: SecuritySchemeType::ApiKey,
            name: Some(name.into()),
            location: Some(location.into()),
            ..Self::basic()
        }
    }

    pub fn oauth2_implicit(authorization_url: impl Into<String>) -> Self {
        Self {
            kind: SecuritySchemeType::OAuth2,
            flow: Some("implicit".to_string()),
            authorization_url: Some(authorization_url.into()),
            scopes: Some(BTreeMap::new()),
            ..Self::basic()
        }
    }
}

/// Path items and security schemes of one spec layer
///
/// This is the payload of the provided, learning and approved layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "paths", default)]
    pub path_items: BTreeMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_definitions: SecurityDefinitions,
}

/// Merged and approved state, rendered by the generator
pub type ApprovedSpec = Document;

/// State updated from telemetry
pub type LearningSpec = Document;

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_path_item(&self, path: &str) -> Option<&PathItem> {
        self.path_items.get(path)
    }

    pub fn add_path_item(&mut self, path: impl Into<String>, item: PathItem) {
        self.path_items.insert(path.into(), item);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path_items.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

/// A complete Swagger 2.0 document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerDocument {
    pub swagger: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub produces: Vec<String>,
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub definitions: Definitions,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_definitions: SecurityDefinitions,
}

/// Version marker of every generated document
pub const SWAGGER_VERSION: &str = "2.0";

/// Paths and security schemes of a full document, e.g. to approve a provided spec
impl From<SwaggerDocument> for Document {
    fn from(document: SwaggerDocument) -> Self {
        Document {
            path_items: document.paths,
            security_definitions: document.security_definitions,
        }
    }
}

/// Externally supplied reference spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidedSpec {
    pub spec: SwaggerDocument,
}

impl ProvidedSpec {
    #[must_use]
    pub fn has_paths(&self) -> bool {
        !self.spec.paths.is_empty()
    }
}
