//! Factoring inline object schemas into the document's `definitions` table.

use super::types::{Definitions, HttpMethod, PathItem, ParameterLocation};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Strategy that moves schemas out of a set of path items into named definitions
pub trait DefinitionsStrategy: Send + Sync {
    /// Rewrite schemas in `paths` in place and return the definitions they now reference
    fn factor(&self, paths: &mut BTreeMap<String, PathItem>) -> Definitions;
}

/// Deduplicates object schemas by structure
///
/// Every object schema with properties in a body parameter or a response is moved into
/// `definitions`, innermost first, and replaced by a `$ref`. Two schemas that are structurally
/// identical share one definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralDefinitions;

impl DefinitionsStrategy for StructuralDefinitions {
    fn factor(&self, paths: &mut BTreeMap<String, PathItem>) -> Definitions {
        reconstruct_object_refs(paths)
    }
}

/// See [`StructuralDefinitions`]
pub fn reconstruct_object_refs(paths: &mut BTreeMap<String, PathItem>) -> Definitions {
    let mut registry = Registry::default();

    for (template, item) in paths.iter_mut() {
        for (method, operation) in item.operations_mut() {
            let context = operation_context(operation.operation_id.as_deref(), method, template);

            for param in &mut operation.parameters {
                if param.location != ParameterLocation::Body {
                    continue;
                }
                if let Some(schema) = param.schema.as_mut() {
                    registry.factor(schema, &format!("{context} Request"));
                }
            }
            for (status, response) in &mut operation.responses {
                if let Some(schema) = response.schema.as_mut() {
                    registry.factor(schema, &format!("{context} {status} Response"));
                }
            }
        }
    }

    registry.definitions
}

fn operation_context(operation_id: Option<&str>, method: HttpMethod, template: &str) -> String {
    match operation_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{} {}", method.as_str(), template),
    }
}

#[derive(Default)]
struct Registry {
    definitions: Definitions,
    /// canonical JSON text → definition name
    by_shape: HashMap<String, String>,
}

impl Registry {
    fn factor(&mut self, schema: &mut Value, hint: &str) {
        let Some(obj) = schema.as_object_mut() else {
            return;
        };
        if obj.contains_key("$ref") {
            return;
        }

        if let Some(items) = obj.get_mut("items") {
            self.factor(items, &format!("{hint} Item"));
        }

        let has_properties = match obj.get_mut("properties").and_then(Value::as_object_mut) {
            Some(props) if !props.is_empty() => {
                for (name, prop) in props.iter_mut() {
                    self.factor(prop, name);
                }
                true
            }
            _ => false,
        };
        if !has_properties {
            return;
        }

        let shape = canonical_json(schema);
        let name = match self.by_shape.get(&shape) {
            Some(name) => name.clone(),
            None => {
                let name = self.unique_name(hint);
                self.definitions.insert(name.clone(), schema.clone());
                self.by_shape.insert(shape, name.clone());
                name
            }
        };
        *schema = json!({ "$ref": format!("#/definitions/{name}") });
    }

    fn unique_name(&self, hint: &str) -> String {
        let base = pascal_case(hint);
        if !self.definitions.contains_key(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.definitions.contains_key(candidate))
            .unwrap_or(base)
    }
}

/// JSON text with object keys sorted at every level
fn canonical_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = Map::new();
                for key in keys {
                    out.insert(key.clone(), sorted(&map[key]));
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// `"get /pets/{id} 200 Response"` → `"GetPetsId200Response"`
#[must_use]
pub fn pascal_case(hint: &str) -> String {
    let name: String = hint
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    if name.is_empty() {
        "Model".to_string()
    } else {
        name
    }
}
