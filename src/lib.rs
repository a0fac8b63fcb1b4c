//! # Speculator
//!
//! **Speculator** passively infers a Swagger 2.0 (OpenAPI 2) document for an HTTP service from
//! observed request/response pairs.
//!
//! ## Overview
//!
//! Captured traffic ([`spec::Telemetry`]) is folded into a *learning* layer, one operation per
//! path and method, by repeated observation. The learning layer is promoted into an *approved*
//! layer, which renders into a validated document with shared schemas factored into
//! `definitions`. An optional *provided* layer holds a reference document to compare against.
//!
//! ## Architecture
//!
//! - **[`pathtrie`]** - Path template index with parameter matching and specificity rules
//! - **[`spec`]** - Spec layers, telemetry model, operation generation, merging and rendering
//! - **[`validator`]** - Structural and semantic validation of Swagger 2.0 documents
//! - **[`config`]** - Environment-based configuration of the generated `info` block and tries
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`cli`]** - The `speculator` command-line front end
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Capture as Traffic capture
//!     participant Spec as spec::Spec
//!     participant Gen as OperationGenerator
//!     participant Merge as OperationMerger
//!     participant Render as DefinitionsStrategy
//!     participant Val as validator
//!
//!     Capture->>Spec: learn_telemetry(&telemetry)
//!     Spec->>Gen: generate(&telemetry, &mut security_definitions)
//!     Gen-->>Spec: Operation
//!     Spec->>Merge: merge(existing, new)
//!     Merge-->>Spec: Operation (union)
//!     Note over Spec: learning layer + learning trie updated
//!     Spec->>Spec: approve_learning_spec()
//!     Spec->>Render: factor(&mut paths)
//!     Render-->>Spec: definitions
//!     Spec->>Val: validate_document(&value)
//!     Val-->>Spec: Ok / issues
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use speculator::spec::{Spec, Telemetry, TelemetryRequest, TelemetryResponse};
//!
//! let spec = Spec::new("petstore", "8080");
//! let telemetry = Telemetry::new(
//!     TelemetryRequest::new("POST", "/pets")
//!         .with_header("Content-Type", "application/json")
//!         .with_body(r#"{"name":"Fluffy","age":3}"#),
//!     TelemetryResponse::new("201"),
//! );
//! spec.learn_telemetry(&telemetry).unwrap();
//! spec.approve_learning_spec();
//!
//! let yaml = spec.generate_document_yaml().unwrap();
//! assert!(yaml.contains("/pets"));
//! ```

pub mod cli;
pub mod config;
pub mod ids;
pub mod logging;
pub mod pathtrie;
pub mod spec;
pub mod validator;

pub use config::SpeculatorConfig;
pub use ids::SpecId;
pub use pathtrie::PathTrie;
pub use spec::{Spec, SpecError, Telemetry};
pub use validator::{validate_document, validate_document_with_separator, ValidationIssue};
