//! # Document Validator Module
//!
//! Checks a rendered Swagger 2.0 document before it is handed out.
//!
//! Validation runs in two passes:
//!
//! 1. **Structural**: the document is checked against a bundled draft-04 JSON Schema for
//!    Swagger 2.0 (`schemas/swagger-2.0.json`), compiled once per process.
//! 2. **Semantic**: rules a JSON Schema cannot express:
//!    - every local `$ref` resolves inside the document
//!    - every `{param}` of a path template is declared `in: path` with `required: true`
//!    - no declared path parameter is missing from its template
//!    - `(name, in)` is unique per operation, with at most one `body` parameter
//!    - `body` and `formData` parameters are not mixed
//!    - `operationId` is unique across the document
//!    - security requirements name a scheme from `securityDefinitions`
//!
//! Every problem found is reported as a [`ValidationIssue`]; nothing stops at the first one.

use crate::pathtrie::{is_path_param, DEFAULT_PATH_SEPARATOR};
use jsonschema::{Draft, Validator};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

const SWAGGER_SCHEMA: &str = include_str!("../schemas/swagger-2.0.json");

const OPERATION_KEYS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

static SWAGGER_VALIDATOR: Lazy<Result<Validator, String>> = Lazy::new(|| {
    let schema: Value = serde_json::from_str(SWAGGER_SCHEMA)
        .map_err(|e| format!("bundled Swagger 2.0 schema is not JSON: {e}"))?;
    jsonschema::options()
        .with_draft(Draft::Draft4)
        .build(&schema)
        .map_err(|e| format!("bundled Swagger 2.0 schema does not compile: {e}"))
});

/// One problem found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer into the document (`/paths/~1pets/get`)
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

/// Print a human readable issue report to stderr
pub fn print_issues(issues: &[ValidationIssue]) {
    eprintln!(
        "\n❌ Swagger document validation failed. {} issue(s) found:\n",
        issues.len()
    );
    for issue in issues {
        eprintln!("{}", issue);
    }
    eprintln!();
}

/// Validate a complete Swagger 2.0 document
///
/// # Errors
///
/// Returns every structural and semantic issue found.
pub fn validate_document(doc: &Value) -> Result<(), Vec<ValidationIssue>> {
    validate_document_with_separator(doc, DEFAULT_PATH_SEPARATOR)
}

/// [`validate_document`] for path templates whose segments are split on `separator`
///
/// # Errors
///
/// Returns every structural and semantic issue found.
pub fn validate_document_with_separator(
    doc: &Value,
    separator: &str,
) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = structural_issues(doc);
    issues.extend(semantic_issues(doc, separator));
    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn structural_issues(doc: &Value) -> Vec<ValidationIssue> {
    match &*SWAGGER_VALIDATOR {
        Ok(validator) => validator
            .iter_errors(doc)
            .map(|error| ValidationIssue::new("/", "Schema", error.to_string()))
            .collect(),
        Err(reason) => vec![ValidationIssue::new("/", "SchemaUnavailable", reason.clone())],
    }
}

/// Issues that only depend on the document's own references and naming
#[must_use]
pub fn semantic_issues(doc: &Value, separator: &str) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    check_refs(doc, doc, "", &mut issues);

    let schemes: BTreeSet<&str> = doc
        .get("securityDefinitions")
        .and_then(Value::as_object)
        .map(|defs| defs.keys().map(String::as_str).collect())
        .unwrap_or_default();
    check_security(doc.get("security"), &schemes, "/security", &mut issues);

    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return issues;
    };

    let mut operation_ids: HashMap<&str, String> = HashMap::new();
    for (template, item) in paths {
        if template.starts_with("x-") {
            continue;
        }
        let Some(item) = item.as_object() else {
            continue;
        };
        let item_location = format!("/paths/{}", escape_pointer(template));
        let shared = resolved_parameters(doc, item.get("parameters"));
        check_parameter_uniqueness(&shared, &format!("{item_location}/parameters"), &mut issues);

        for method in OPERATION_KEYS {
            let Some(operation) = item.get(method).and_then(Value::as_object) else {
                continue;
            };
            let location = format!("{item_location}/{method}");
            let own = resolved_parameters(doc, operation.get("parameters"));
            check_parameter_uniqueness(&own, &format!("{location}/parameters"), &mut issues);

            let effective = effective_parameters(&shared, &own);
            check_payload(&effective, &location, &mut issues);
            check_path_parameters(template, separator, &effective, &location, &mut issues);
            check_security(
                operation.get("security"),
                &schemes,
                &format!("{location}/security"),
                &mut issues,
            );

            if let Some(id) = operation.get("operationId").and_then(Value::as_str) {
                if let Some(first) = operation_ids.get(id) {
                    issues.push(ValidationIssue::new(
                        location.clone(),
                        "DuplicateOperationId",
                        format!("operationId '{id}' is already used at {first}"),
                    ));
                } else {
                    operation_ids.insert(id, location.clone());
                }
            }
        }
    }

    issues
}

/// Escape a key for use as a JSON pointer token
#[must_use]
pub fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn check_refs(root: &Value, value: &Value, location: &str, issues: &mut Vec<ValidationIssue>) {
    match value {
        Value::Object(map) => {
            if let Some(target) = map.get("$ref").and_then(Value::as_str) {
                if resolve_ref(root, target).is_none() {
                    issues.push(ValidationIssue::new(
                        if location.is_empty() { "/" } else { location },
                        "UnresolvedRef",
                        format!("reference '{target}' does not resolve"),
                    ));
                }
            }
            for (key, child) in map {
                check_refs(root, child, &format!("{location}/{}", escape_pointer(key)), issues);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                check_refs(root, child, &format!("{location}/{i}"), issues);
            }
        }
        _ => {}
    }
}

fn resolve_ref<'a>(root: &'a Value, target: &str) -> Option<&'a Value> {
    let pointer = target.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    root.pointer(pointer)
}

/// Parameters of a list, following local `$ref`s; unresolved entries are skipped
fn resolved_parameters<'a>(root: &'a Value, list: Option<&'a Value>) -> Vec<&'a Map<String, Value>> {
    list.and_then(Value::as_array)
        .map(|params| {
            params
                .iter()
                .filter_map(|param| match param.get("$ref").and_then(Value::as_str) {
                    Some(target) => resolve_ref(root, target),
                    None => Some(param),
                })
                .filter_map(Value::as_object)
                .collect()
        })
        .unwrap_or_default()
}

fn slot(param: &Map<String, Value>) -> (&str, &str) {
    (
        param.get("name").and_then(Value::as_str).unwrap_or_default(),
        param.get("in").and_then(Value::as_str).unwrap_or_default(),
    )
}

/// Path-level parameters overridden by operation-level ones with the same `(name, in)`
fn effective_parameters<'a>(
    shared: &[&'a Map<String, Value>],
    own: &[&'a Map<String, Value>],
) -> Vec<&'a Map<String, Value>> {
    let mut effective: Vec<&Map<String, Value>> = shared
        .iter()
        .filter(|p| !own.iter().any(|o| slot(o) == slot(p)))
        .copied()
        .collect();
    effective.extend(own.iter().copied());
    effective
}

fn check_parameter_uniqueness(
    params: &[&Map<String, Value>],
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let mut seen = BTreeSet::new();
    for param in params {
        let (name, place) = slot(param);
        if !seen.insert((name, place)) {
            issues.push(ValidationIssue::new(
                location,
                "DuplicateParameter",
                format!("parameter '{name}' in {place} is declared more than once"),
            ));
        }
    }
}

fn check_payload(params: &[&Map<String, Value>], location: &str, issues: &mut Vec<ValidationIssue>) {
    let bodies = params.iter().filter(|p| slot(p).1 == "body").count();
    let forms = params.iter().filter(|p| slot(p).1 == "formData").count();
    if bodies > 1 {
        issues.push(ValidationIssue::new(
            location,
            "MultipleBodyParameters",
            format!("{bodies} body parameters declared, at most one is allowed"),
        ));
    }
    if bodies > 0 && forms > 0 {
        issues.push(ValidationIssue::new(
            location,
            "BodyAndFormData",
            "body and formData parameters cannot be combined",
        ));
    }
}

/// Names between braces in a path template split on `separator`
#[must_use]
pub fn template_parameters<'a>(template: &'a str, separator: &str) -> Vec<&'a str> {
    template
        .split(separator)
        .filter(|segment| is_path_param(segment))
        .map(|segment| &segment[1..segment.len() - 1])
        .collect()
}

fn check_path_parameters(
    template: &str,
    separator: &str,
    params: &[&Map<String, Value>],
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let names = template_parameters(template, separator);
    for name in &names {
        match params.iter().find(|p| slot(p) == (*name, "path")) {
            None => issues.push(ValidationIssue::new(
                location,
                "MissingPathParameter",
                format!("path parameter '{name}' of '{template}' is not declared"),
            )),
            Some(param) if param.get("required") != Some(&Value::Bool(true)) => {
                issues.push(ValidationIssue::new(
                    location,
                    "PathParameterNotRequired",
                    format!("path parameter '{name}' must be required"),
                ))
            }
            Some(_) => {}
        }
    }
    for param in params {
        let (name, place) = slot(param);
        if place == "path" && !names.contains(&name) {
            issues.push(ValidationIssue::new(
                location,
                "UnknownPathParameter",
                format!("path parameter '{name}' does not appear in '{template}'"),
            ));
        }
    }
}

fn check_security(
    security: Option<&Value>,
    schemes: &BTreeSet<&str>,
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(requirements) = security.and_then(Value::as_array) else {
        return;
    };
    for requirement in requirements.iter().filter_map(Value::as_object) {
        for name in requirement.keys() {
            if !schemes.contains(name.as_str()) {
                issues.push(ValidationIssue::new(
                    location,
                    "UndefinedSecurityScheme",
                    format!("security scheme '{name}' is not defined"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(paths: Value) -> Value {
        json!({
            "swagger": "2.0",
            "info": { "title": "Swagger", "version": "1.0.0" },
            "paths": paths
        })
    }

    fn kinds(result: Result<(), Vec<ValidationIssue>>) -> Vec<String> {
        result.unwrap_err().into_iter().map(|i| i.kind).collect()
    }

    #[test]
    fn test_empty_document_is_valid() {
        assert_eq!(validate_document(&doc(json!({}))), Ok(()));
    }

    #[test]
    fn test_structural_errors() {
        let bad = json!({ "swagger": "3.0", "paths": {} });
        let issues = validate_document(&bad).unwrap_err();
        assert!(issues.iter().all(|i| i.kind == "Schema"));
        assert!(!issues.is_empty());

        let no_responses = doc(json!({ "/a": { "get": {} } }));
        assert!(kinds(validate_document(&no_responses)).contains(&"Schema".to_string()));
    }

    #[test]
    fn test_path_parameters_follow_separator() {
        let dotted = doc(json!({
            "/svc.{id}": { "get": { "responses": { "200": { "description": "OK" } } } }
        }));
        assert_eq!(validate_document(&dotted), Ok(()));
        assert_eq!(
            kinds(validate_document_with_separator(&dotted, ".")),
            vec!["MissingPathParameter"]
        );
    }

    #[test]
    fn test_path_parameter_rules() {
        let missing = doc(json!({
            "/pets/{id}": { "get": { "responses": { "200": { "description": "OK" } } } }
        }));
        assert_eq!(kinds(validate_document(&missing)), vec!["MissingPathParameter"]);

        let optional = doc(json!({
            "/pets/{id}": { "get": {
                "parameters": [{ "name": "id", "in": "path", "type": "string" }],
                "responses": { "200": { "description": "OK" } }
            } }
        }));
        assert_eq!(kinds(validate_document(&optional)), vec!["PathParameterNotRequired"]);

        let shared = doc(json!({
            "/pets/{id}": {
                "parameters": [{ "name": "id", "in": "path", "required": true, "type": "string" }],
                "get": { "responses": { "200": { "description": "OK" } } }
            }
        }));
        assert_eq!(validate_document(&shared), Ok(()));

        let unknown = doc(json!({
            "/pets": { "get": {
                "parameters": [{ "name": "id", "in": "path", "required": true, "type": "string" }],
                "responses": { "200": { "description": "OK" } }
            } }
        }));
        assert_eq!(kinds(validate_document(&unknown)), vec!["UnknownPathParameter"]);
    }

    #[test]
    fn test_parameter_rules() {
        let duplicated = doc(json!({
            "/a": { "post": {
                "parameters": [
                    { "name": "q", "in": "query", "type": "string" },
                    { "name": "q", "in": "query", "type": "integer" },
                    { "name": "b1", "in": "body", "schema": {} },
                    { "name": "b2", "in": "body", "schema": {} },
                    { "name": "f", "in": "formData", "type": "string" }
                ],
                "responses": { "200": { "description": "OK" } }
            } }
        }));
        let found = kinds(validate_document(&duplicated));
        assert!(found.contains(&"DuplicateParameter".to_string()));
        assert!(found.contains(&"MultipleBodyParameters".to_string()));
        assert!(found.contains(&"BodyAndFormData".to_string()));
    }

    #[test]
    fn test_refs_and_operation_ids() {
        let document = json!({
            "swagger": "2.0",
            "info": { "title": "t", "version": "1" },
            "paths": {
                "/a": { "get": {
                    "operationId": "listA",
                    "responses": { "200": { "description": "OK", "schema": { "$ref": "#/definitions/A" } } }
                } },
                "/b": { "get": {
                    "operationId": "listA",
                    "responses": { "200": { "description": "OK", "schema": { "$ref": "#/definitions/B" } } }
                } }
            },
            "definitions": { "A": { "type": "object" } }
        });
        let issues = validate_document(&document).unwrap_err();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, "UnresolvedRef");
        assert_eq!(issues[0].location, "/paths/~1b/get/responses/200/schema");
        assert_eq!(issues[1].kind, "DuplicateOperationId");
    }

    #[test]
    fn test_undefined_security_scheme() {
        let document = doc(json!({
            "/a": { "get": {
                "security": [{ "OAuth2": [] }],
                "responses": { "200": { "description": "OK" } }
            } }
        }));
        assert_eq!(kinds(validate_document(&document)), vec!["UndefinedSecurityScheme"]);
    }

    #[test]
    fn test_template_parameters_and_pointer_escape() {
        assert_eq!(template_parameters("/a/{x}/b/{y}", "/"), vec!["x", "y"]);
        assert!(template_parameters("/a/{}/b", "/").is_empty());
        assert_eq!(template_parameters("/svc.{id}", "."), vec!["id"]);
        assert!(template_parameters("/svc.{id}", "/").is_empty());
        assert_eq!(escape_pointer("/a~b/{id}"), "~1a~0b~1{id}");
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new("/paths", "Schema", "boom");
        assert_eq!(issue.to_string(), "[Schema] /paths: boom");
    }
}
