#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const PROVIDED_JSON: &str = r#"{
  "swagger": "2.0",
  "info": { "title": "Pet Store", "version": "1.0.0" },
  "paths": {
    "/pets": { "get": { "responses": { "200": { "description": "OK" } } } },
    "/pets/{petId}": {
      "get": {
        "parameters": [{ "name": "petId", "in": "path", "required": true, "type": "integer" }],
        "responses": { "200": { "description": "OK" } }
      }
    }
  }
}"#;

fn speculator(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_speculator"))
        .args(args)
        .env("SPECULATOR_LOG_LEVEL", "error")
        .output()
        .expect("run speculator")
}

fn telemetry_line(method: &str, path: &str, status: &str) -> String {
    json!({
        "requestID": "r",
        "request": { "method": method, "path": path, "common": { "headers": [] } },
        "response": { "statusCode": status, "common": { "headers": [] } }
    })
    .to_string()
}

fn write(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_cli_learn_writes_json_document() {
    let dir = TempDir::new().unwrap();
    let lines = [
        telemetry_line("GET", "/pets?limit=10", "200"),
        String::new(),
        "this is not json".to_string(),
        telemetry_line("TRACE", "/pets", "200"),
        telemetry_line("GET", "/pets/1", "404"),
    ]
    .join("\n");
    let telemetry = write(&dir, "capture.jsonl", &lines);

    let output = speculator(&[
        "learn",
        "--telemetry",
        &telemetry,
        "--host",
        "petstore",
        "--port",
        "8080",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["swagger"], "2.0");
    assert_eq!(doc["host"], "petstore:8080");
    assert_eq!(doc["paths"]["/pets"]["get"]["parameters"][0]["name"], "limit");
    assert_eq!(doc["paths"]["/pets/1"]["get"]["responses"]["404"]["description"], "Not Found");
    assert_eq!(doc["paths"].as_object().unwrap().len(), 2);
}

#[test]
fn test_cli_learn_yaml_to_file_with_provided_spec() {
    let dir = TempDir::new().unwrap();
    let telemetry = write(&dir, "capture.jsonl", &telemetry_line("POST", "/owners", "201"));
    let provided = write(&dir, "provided.json", PROVIDED_JSON);
    let out = dir.path().join("learned.yaml");

    let output = speculator(&[
        "learn",
        "--telemetry",
        &telemetry,
        "--host",
        "petstore",
        "--provided",
        &provided,
        "--format",
        "yaml",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert!(output.stdout.is_empty());

    let doc: Value = serde_yaml::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["host"], "petstore");
    assert!(doc["paths"]["/owners"]["post"]["responses"]["201"].is_object());
}

#[test]
fn test_cli_learn_missing_telemetry_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.jsonl");
    let output = speculator(&["learn", "--telemetry", missing.to_str().unwrap(), "--host", "h"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to open"));
}

#[test]
fn test_cli_resolve() {
    let dir = TempDir::new().unwrap();
    let spec = write(&dir, "provided.json", PROVIDED_JSON);

    let output = speculator(&["resolve", "--spec", &spec, "/pets/42", "/pets", "/owners"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec!["/pets/42 -> /pets/{petId} [GET]", "/pets -> /pets [GET]", "/owners -> <none>"]
    );
}

#[test]
fn test_cli_validate() {
    let dir = TempDir::new().unwrap();
    let valid = write(&dir, "valid.json", PROVIDED_JSON);
    let output = speculator(&["validate", "--spec", &valid]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("is a valid Swagger 2.0 document"));

    let invalid = write(
        &dir,
        "invalid.yaml",
        "swagger: \"2.0\"\ninfo:\n  title: t\n  version: \"1\"\npaths:\n  /a/{id}:\n    get:\n      responses:\n        \"200\":\n          description: OK\n",
    );
    let output = speculator(&["validate", "--spec", &invalid]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("MissingPathParameter"), "{stderr}");
    assert!(Path::new(&invalid).exists());
}
