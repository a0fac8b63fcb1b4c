//! # Spec Module
//!
//! Passive inference of a Swagger 2.0 document from observed HTTP traffic.
//!
//! - [`telemetry`](Telemetry): the captured request/response pairs fed in
//! - [`OperationGenerator`]: turns one sample into an [`Operation`]
//! - [`OperationMerger`]: folds repeated observations of the same operation together
//! - [`DefinitionsStrategy`]: factors inline schemas into `definitions` when rendering
//! - [`Spec`]: the provided, learning and approved layers of one service, under one lock

mod definitions;
mod error;
mod generate;
mod merge;
mod state;
mod telemetry;
mod types;

pub use definitions::{pascal_case, reconstruct_object_refs, DefinitionsStrategy, StructuralDefinitions};
pub use error::{GenerateError, SpecError};
pub use generate::{
    infer_primitive, schema_from_json, OperationGenerator, TelemetryOperationGenerator,
    BASIC_AUTH_SCHEME, OAUTH2_SCHEME,
};
pub use merge::{merge_schema, OperationMerger, UnionMerger};
pub use state::{Spec, SpecInfo};
pub use telemetry::{
    path_and_query, Header, MessageCommon, Telemetry, TelemetryRequest, TelemetryResponse,
};
pub use types::*;
