//! Combining a newly learned operation with the one already recorded.
//!
//! The contract of [`OperationMerger`] is union-only: merging never drops a parameter,
//! response, media type or schema property that was accepted before; it only widens.
//! Merging an operation with itself returns it unchanged.

use super::types::{Operation, Parameter, ParameterLocation, Response};
use serde_json::{Map, Value};

/// Policy used by the learning layer when an operation already exists for a path and method
pub trait OperationMerger: Send + Sync {
    fn merge(&self, existing: &Operation, new: &Operation) -> Operation;
}

/// Default union/widen merge policy
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionMerger;

impl OperationMerger for UnionMerger {
    fn merge(&self, existing: &Operation, new: &Operation) -> Operation {
        let mut merged = existing.clone();

        union_into(&mut merged.tags, &new.tags);
        union_into(&mut merged.consumes, &new.consumes);
        union_into(&mut merged.produces, &new.produces);
        union_into(&mut merged.security, &new.security);

        if merged.summary.is_none() {
            merged.summary.clone_from(&new.summary);
        }
        if merged.description.is_none() {
            merged.description.clone_from(&new.description);
        }
        if merged.operation_id.is_none() {
            merged.operation_id.clone_from(&new.operation_id);
        }
        merged.deprecated = merged.deprecated.or(new.deprecated);

        for param in &new.parameters {
            let conflict = conflicts_with_payload(&merged.parameters, param);
            match merged.parameters.iter_mut().find(|p| p.same_slot(param)) {
                Some(current) => merge_parameter(current, param),
                None if conflict => {}
                None => merged.parameters.push(param.clone()),
            }
        }

        for (status, response) in &new.responses {
            match merged.responses.get_mut(status) {
                Some(current) => merge_response(current, response),
                None => {
                    merged.responses.insert(status.clone(), response.clone());
                }
            }
        }

        merged
    }
}

/// Body and form parameters cannot coexist; the payload kind seen first wins
fn conflicts_with_payload(existing: &[Parameter], param: &Parameter) -> bool {
    let has = |location: ParameterLocation| existing.iter().any(|p| p.location == location);
    match param.location {
        ParameterLocation::Body => has(ParameterLocation::FormData) || has(ParameterLocation::Body),
        ParameterLocation::FormData => has(ParameterLocation::Body),
        _ => false,
    }
}

fn union_into<T: Clone + PartialEq>(target: &mut Vec<T>, extra: &[T]) {
    for item in extra {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

fn merge_parameter(current: &mut Parameter, new: &Parameter) {
    // a parameter missing from some observations is optional
    current.required = current.required && new.required;

    match (current.kind.as_deref(), new.kind.as_deref()) {
        (None, _) => {
            current.kind.clone_from(&new.kind);
            current.format.clone_from(&new.format);
        }
        (Some(_), None) => {}
        (Some(a), Some(b)) if (a == ARRAY) != (b == ARRAY) => {
            // a key sent both once and repeated is an array of its values
            let mut items = current
                .items
                .take()
                .unwrap_or_else(|| primitive_schema(current));
            let observed = new.items.clone().unwrap_or_else(|| primitive_schema(new));
            merge_schema(&mut items, &observed);
            current.kind = Some(ARRAY.to_string());
            current.format = None;
            current.items = Some(items);
        }
        (Some(a), Some(b)) if a == b => {
            if current.format != new.format {
                current.format = None;
            }
        }
        (Some(a), Some(b)) => {
            current.kind = Some(widen_primitive(a, b).to_string());
            current.format = None;
        }
    }
    if current.collection_format.is_none() {
        current
            .collection_format
            .clone_from(&new.collection_format);
    }
    merge_optional_schema(&mut current.items, &new.items);
    merge_optional_schema(&mut current.schema, &new.schema);
}

fn merge_response(current: &mut Response, new: &Response) {
    if current.description.is_empty() {
        current.description.clone_from(&new.description);
    }
    merge_optional_schema(&mut current.schema, &new.schema);
    for (name, header) in &new.headers {
        current
            .headers
            .entry(name.clone())
            .or_insert_with(|| header.clone());
    }
}

fn merge_optional_schema(current: &mut Option<Value>, new: &Option<Value>) {
    match (current.as_mut(), new) {
        (Some(current), Some(new)) => merge_schema(current, new),
        (None, Some(new)) => *current = Some(new.clone()),
        _ => {}
    }
}

const ARRAY: &str = "array";

/// Schema of one value of a non-array parameter
fn primitive_schema(param: &Parameter) -> Value {
    let mut schema = Map::new();
    if let Some(kind) = &param.kind {
        schema.insert("type".to_string(), Value::String(kind.clone()));
    }
    if let Some(format) = &param.format {
        schema.insert("format".to_string(), Value::String(format.clone()));
    }
    Value::Object(schema)
}

/// Narrowest type covering two differing primitive parameter types
///
/// Parameter values travel as text, so anything but two numeric types widens to `string`.
fn widen_primitive(a: &str, b: &str) -> &'static str {
    if is_numeric(a) && is_numeric(b) {
        "number"
    } else {
        "string"
    }
}

fn is_numeric(kind: &str) -> bool {
    kind == "integer" || kind == "number"
}

/// Widen `current` so that it also describes everything `new` describes
///
/// - objects union their `properties`, recursively
/// - arrays merge their `items`
/// - an untyped schema adopts the other one
/// - differing `format`s on the same type are dropped
/// - `integer` and `number` widen to `number`
/// - other conflicting types keep `current` unchanged
pub fn merge_schema(current: &mut Value, new: &Value) {
    let (Some(current_obj), Some(new_obj)) = (current.as_object(), new.as_object()) else {
        return;
    };
    if current_obj.contains_key("$ref") || new_obj.contains_key("$ref") {
        return;
    }

    match (current_obj.get("type"), new_obj.get("type")) {
        (None, Some(_)) if is_untyped_placeholder(current_obj) => {
            *current = new.clone();
            return;
        }
        (Some(Value::String(a)), Some(Value::String(b))) if a != b => {
            if is_numeric(a) && is_numeric(b) {
                if let Some(obj) = current.as_object_mut() {
                    obj.insert("type".to_string(), Value::String("number".to_string()));
                    obj.remove("format");
                }
            }
            return;
        }
        (Some(a), Some(b)) if a != b => return,
        _ => {}
    }

    let Some(current_obj) = current.as_object_mut() else {
        return;
    };

    if current_obj.get("format") != new_obj.get("format") {
        current_obj.remove("format");
    }

    if let Some(new_props) = new_obj.get("properties").and_then(Value::as_object) {
        let props = current_obj
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(props) = props.as_object_mut() {
            for (name, schema) in new_props {
                match props.get_mut(name) {
                    Some(existing) => merge_schema(existing, schema),
                    None => {
                        props.insert(name.clone(), schema.clone());
                    }
                }
            }
        }
    }

    if let Some(new_items) = new_obj.get("items") {
        match current_obj.get_mut("items") {
            Some(existing) => merge_schema(existing, new_items),
            None => {
                current_obj.insert("items".to_string(), new_items.clone());
            }
        }
    }
}

/// `{}` or a schema carrying only annotations
fn is_untyped_placeholder(schema: &Map<String, Value>) -> bool {
    !schema.contains_key("properties") && !schema.contains_key("items")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::types::ResponseHeader;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn op_with(params: Vec<Parameter>, status: &str, schema: Option<Value>) -> Operation {
        Operation {
            parameters: params,
            responses: BTreeMap::from([(
                status.to_string(),
                Response {
                    description: "OK".into(),
                    schema,
                    headers: BTreeMap::new(),
                },
            )]),
            ..Operation::default()
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let op = Operation {
            consumes: vec!["application/json".into()],
            ..op_with(
                vec![
                    Parameter::simple("limit", ParameterLocation::Query, "integer"),
                    Parameter::body(
                        "body",
                        json!({ "type": "object", "properties": { "a": { "type": "string", "format": "uuid" } } }),
                    ),
                ],
                "200",
                Some(json!({ "type": "array", "items": { "type": "integer" } })),
            )
        };
        assert_eq!(UnionMerger.merge(&op, &op), op);
    }

    #[test]
    fn test_merge_unions_parameters_and_responses() {
        let existing = op_with(
            vec![Parameter::simple("limit", ParameterLocation::Query, "integer")],
            "200",
            None,
        );
        let new = Operation {
            produces: vec!["application/json".into()],
            ..op_with(
                vec![
                    Parameter::simple("offset", ParameterLocation::Query, "integer"),
                    Parameter::simple("limit", ParameterLocation::Header, "string"),
                ],
                "404",
                None,
            )
        };

        let merged = UnionMerger.merge(&existing, &new);
        assert_eq!(merged.parameters.len(), 3);
        assert!(merged.parameter("limit", ParameterLocation::Query).is_some());
        assert!(merged.parameter("limit", ParameterLocation::Header).is_some());
        assert!(merged.responses.contains_key("200"));
        assert!(merged.responses.contains_key("404"));
        assert_eq!(merged.produces, vec!["application/json"]);
    }

    #[test]
    fn test_merge_required_is_conjunction() {
        let mut required = Parameter::simple("x", ParameterLocation::Header, "string");
        required.required = true;
        let optional = Parameter::simple("x", ParameterLocation::Header, "string");

        let merged = UnionMerger.merge(
            &op_with(vec![required], "200", None),
            &op_with(vec![optional], "200", None),
        );
        assert!(!merged.parameters[0].required);
    }

    #[test]
    fn test_body_and_form_do_not_mix() {
        let body = op_with(
            vec![Parameter::body("body", json!({ "type": "object" }))],
            "200",
            None,
        );
        let form = op_with(
            vec![Parameter::simple("user", ParameterLocation::FormData, "string")],
            "200",
            None,
        );
        let merged = UnionMerger.merge(&body, &form);
        assert_eq!(merged.parameters, body.parameters);

        let merged = UnionMerger.merge(&form, &body);
        assert_eq!(merged.parameters, form.parameters);
    }

    #[test]
    fn test_merge_schema_unions_properties() {
        let mut current = json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "format": "int64" },
                "owner": { "type": "object", "properties": { "name": { "type": "string" } } }
            }
        });
        let new = json!({
            "type": "object",
            "properties": {
                "tag": { "type": "string" },
                "owner": { "type": "object", "properties": { "email": { "type": "string" } } }
            }
        });
        merge_schema(&mut current, &new);
        assert_eq!(
            current,
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "integer", "format": "int64" },
                    "tag": { "type": "string" },
                    "owner": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "email": { "type": "string" }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_merge_schema_conflicting_types_keep_existing() {
        let mut current = json!({ "type": "integer", "format": "int64" });
        merge_schema(&mut current, &json!({ "type": "string" }));
        assert_eq!(current, json!({ "type": "integer", "format": "int64" }));
    }

    #[test]
    fn test_merge_schema_widens_integer_to_number() {
        let mut current = json!({
            "type": "object",
            "properties": { "n": { "type": "integer", "format": "int64" } }
        });
        merge_schema(
            &mut current,
            &json!({ "type": "object", "properties": { "n": { "type": "number" } } }),
        );
        assert_eq!(current["properties"]["n"], json!({ "type": "number" }));

        let mut number = json!({ "type": "number" });
        merge_schema(&mut number, &json!({ "type": "integer", "format": "int64" }));
        assert_eq!(number, json!({ "type": "number" }));
    }

    #[test]
    fn test_repeated_query_key_widens_to_array() {
        let mut array = Parameter::simple("tag", ParameterLocation::Query, "array");
        array.items = Some(json!({ "type": "string" }));
        array.collection_format = Some("multi".into());
        let scalar = Parameter::simple("tag", ParameterLocation::Query, "string");

        let expected = vec![array.clone()];
        for (first, second) in [(&scalar, &array), (&array, &scalar)] {
            let merged = UnionMerger.merge(
                &op_with(vec![first.clone()], "200", None),
                &op_with(vec![second.clone()], "200", None),
            );
            assert_eq!(merged.parameters, expected);
        }
    }

    #[test]
    fn test_scalar_array_widening_merges_items() {
        let id = Parameter::simple("id", ParameterLocation::Query, "integer");
        let mut ids = Parameter::simple("id", ParameterLocation::Query, "array");
        ids.items = Some(json!({ "type": "number" }));
        ids.collection_format = Some("multi".into());

        let merged = UnionMerger.merge(
            &op_with(vec![id], "200", None),
            &op_with(vec![ids], "200", None),
        );
        let param = &merged.parameters[0];
        assert_eq!(param.kind.as_deref(), Some("array"));
        assert_eq!(param.format, None);
        assert_eq!(param.items, Some(json!({ "type": "number" })));
        assert_eq!(param.collection_format.as_deref(), Some("multi"));
    }

    #[test]
    fn test_conflicting_parameter_types_widen() {
        let merged = UnionMerger.merge(
            &op_with(
                vec![
                    Parameter::simple("page", ParameterLocation::Query, "integer"),
                    Parameter::simple("q", ParameterLocation::Query, "boolean"),
                ],
                "200",
                None,
            ),
            &op_with(
                vec![
                    Parameter::simple("page", ParameterLocation::Query, "number"),
                    Parameter::simple("q", ParameterLocation::Query, "integer"),
                ],
                "200",
                None,
            ),
        );
        assert_eq!(merged.parameters[0].kind.as_deref(), Some("number"));
        assert_eq!(merged.parameters[1].kind.as_deref(), Some("string"));
    }

    #[test]
    fn test_header_names_merge_case_insensitively() {
        let merged = UnionMerger.merge(
            &op_with(
                vec![Parameter::simple("X-Id", ParameterLocation::Header, "string")],
                "200",
                None,
            ),
            &op_with(
                vec![
                    Parameter::simple("x-id", ParameterLocation::Header, "string"),
                    Parameter::simple("x-id", ParameterLocation::Query, "string"),
                ],
                "200",
                None,
            ),
        );
        assert_eq!(merged.parameters.len(), 2);
        assert_eq!(merged.parameters[0].name, "X-Id");
        assert!(merged.parameter("X-ID", ParameterLocation::Header).is_some());
    }

    #[test]
    fn test_merge_schema_fills_untyped_items() {
        let mut current = json!({ "type": "array", "items": {} });
        merge_schema(
            &mut current,
            &json!({ "type": "array", "items": { "type": "object", "properties": { "a": { "type": "boolean" } } } }),
        );
        assert_eq!(current["items"]["properties"]["a"]["type"], "boolean");
    }

    #[test]
    fn test_merge_schema_widens_format() {
        let mut current = json!({ "type": "string", "format": "uuid" });
        merge_schema(&mut current, &json!({ "type": "string" }));
        assert_eq!(current, json!({ "type": "string" }));
    }

    #[test]
    fn test_merge_response_headers() {
        let mut existing = op_with(vec![], "200", None);
        existing.responses.get_mut("200").unwrap().headers.insert(
            "x-a".into(),
            ResponseHeader {
                kind: "string".into(),
                format: None,
                description: None,
            },
        );
        let mut new = op_with(vec![], "200", Some(json!({ "type": "string" })));
        new.responses.get_mut("200").unwrap().headers.insert(
            "x-b".into(),
            ResponseHeader {
                kind: "integer".into(),
                format: None,
                description: None,
            },
        );
        let merged = UnionMerger.merge(&existing, &new);
        let ok = &merged.responses["200"];
        assert_eq!(ok.headers.len(), 2);
        assert_eq!(ok.schema, Some(json!({ "type": "string" })));
    }
}
