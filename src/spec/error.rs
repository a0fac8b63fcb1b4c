use crate::validator::ValidationIssue;
use std::fmt;

/// Why one telemetry sample could not be turned into an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// Method has no Swagger 2.0 slot (e.g. `TRACE`, `CONNECT`)
    UnsupportedMethod(String),
    /// Request target is not an absolute path or has a `{param}` segment
    InvalidPath(String),
    /// Response status is not a three digit HTTP status
    InvalidStatusCode(String),
    /// Body declared as JSON failed to parse
    InvalidJsonBody {
        /// `request` or `response`
        part: &'static str,
        message: String,
    },
    /// Non-empty request body with a media type that cannot be described
    UnsupportedContentType(String),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::UnsupportedMethod(method) => {
                write!(f, "unsupported HTTP method '{}'", method)
            }
            GenerateError::InvalidPath(path) if !path.starts_with('/') => {
                write!(f, "request path '{}' does not start with '/'", path)
            }
            GenerateError::InvalidPath(path) => {
                write!(f, "request path '{}' contains a template segment", path)
            }
            GenerateError::InvalidStatusCode(code) => {
                write!(f, "invalid response status code '{}'", code)
            }
            GenerateError::InvalidJsonBody { part, message } => {
                write!(f, "invalid JSON {} body: {}", part, message)
            }
            GenerateError::UnsupportedContentType(media_type) if media_type.is_empty() => {
                write!(f, "request body without a content type")
            }
            GenerateError::UnsupportedContentType(media_type) => {
                write!(f, "unsupported request content type '{}'", media_type)
            }
        }
    }
}

impl std::error::Error for GenerateError {}

/// Errors returned by [`crate::spec::Spec`] operations
///
/// Every failure is local to the call that returned it; the spec layers keep their previous
/// state.
#[derive(Debug, Clone, PartialEq)]
pub enum SpecError {
    /// A telemetry sample could not be converted; it was dropped
    TelemetryConversion {
        method: String,
        path: String,
        source: GenerateError,
    },
    /// The approved layer could not be copied for rendering or cloning
    Clone(String),
    /// The assembled document failed validation
    SpecValidation(Vec<ValidationIssue>),
    /// The document could not be encoded
    Serialization(String),
    /// A provided spec could not be parsed
    ProvidedSpecLoad(String),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecError::TelemetryConversion {
                method,
                path,
                source,
            } => write!(
                f,
                "failed to convert telemetry to operation ({} {}): {}",
                method, path, source
            ),
            SpecError::Clone(reason) => write!(f, "failed to clone approved spec: {}", reason),
            SpecError::SpecValidation(issues) => {
                write!(f, "spec validation failed with {} issue(s)", issues.len())?;
                for issue in issues {
                    write!(f, "; {}", issue)?;
                }
                Ok(())
            }
            SpecError::Serialization(reason) => write!(f, "failed to encode the spec: {}", reason),
            SpecError::ProvidedSpecLoad(reason) => {
                write!(f, "failed to load provided spec: {}", reason)
            }
        }
    }
}

impl std::error::Error for SpecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpecError::TelemetryConversion { source, .. } => Some(source),
            _ => None,
        }
    }
}
