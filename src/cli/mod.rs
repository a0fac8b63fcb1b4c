//! # CLI Module
//!
//! Command-line front end for the spec generator, shipped as the `speculator` binary.
//!
//! ## Commands
//!
//! ### `learn`
//!
//! Learn a document from captured traffic, one telemetry JSON object per line:
//!
//! ```bash
//! speculator learn --telemetry capture.jsonl --host petstore --port 8080 --format yaml
//! ```
//!
//! Samples that cannot be parsed or described are logged and skipped. With
//! `--provided <spec>`, learned operations missing from that spec are reported at `warn`.
//!
//! ### `resolve`
//!
//! Print the template each concrete path resolves to:
//!
//! ```bash
//! speculator resolve --spec openapi.yaml /pets/42 /users/admin
//! ```
//!
//! ### `validate`
//!
//! ```bash
//! speculator validate --spec openapi.yaml
//! ```
//!
//! Logging is configured from `SPECULATOR_LOG_*` (see [`crate::logging`]) and always goes to
//! stderr.

mod commands;


pub use commands::{run, run_cli, Cli, Commands, OutputFormat};
