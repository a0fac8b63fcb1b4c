//! # Spec State
//!
//! [`Spec`] holds the three spec layers of one monitored `(host, port)`:
//!
//! - **provided**: an externally supplied reference document, read-only
//! - **learning**: built up from observed traffic by [`Spec::learn_telemetry`]
//! - **approved**: the promoted snapshot that [`Spec::generate_document`] renders
//!
//! Each layer has a [`PathTrie`] mapping its path templates to the methods defined on them.
//!
//! ## Locking
//!
//! All state lives in one [`SpecInfo`] behind a single `Mutex`. Mutations hold it for their
//! whole duration and commit in a final step, so they recover from a lock poisoned by an
//! earlier panic and clear the poison flag. Rendering, cloning and the snapshot accessors also
//! take the lock; they refuse with [`SpecError::Clone`] while it is poisoned, that is until the
//! next mutation.
//!
//! ## Example
//!
//! ```rust
//! use speculator::spec::{Spec, Telemetry, TelemetryRequest, TelemetryResponse};
//!
//! let spec = Spec::new("petstore", "8080");
//! spec.learn_telemetry(&Telemetry::new(
//!     TelemetryRequest::new("GET", "/pets?limit=10"),
//!     TelemetryResponse::new("200"),
//! ))
//! .unwrap();
//! spec.approve_learning_spec();
//!
//! let json = spec.generate_document_json().unwrap();
//! let doc: serde_json::Value = serde_json::from_slice(&json).unwrap();
//! assert_eq!(doc["host"], "petstore:8080");
//! assert!(doc["paths"]["/pets"]["get"].is_object());
//! ```

use super::definitions::{DefinitionsStrategy, StructuralDefinitions};
use super::error::{GenerateError, SpecError};
use super::generate::{OperationGenerator, TelemetryOperationGenerator};
use super::merge::{OperationMerger, UnionMerger};
use super::telemetry::{path_and_query, Telemetry};
use super::types::{
    ApprovedSpec, HttpMethod, LearningSpec, MethodSet, PathItem, ProvidedSpec,
    SwaggerDocument, SWAGGER_VERSION,
};
use crate::config::SpeculatorConfig;
use crate::ids::SpecId;
use crate::pathtrie::{is_path_param, PathTrie};
use crate::validator::validate_document_with_separator;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Everything guarded by a [`Spec`]'s lock
#[derive(Debug, Clone)]
pub struct SpecInfo {
    pub host: String,
    pub port: String,
    pub id: SpecId,
    pub provided_spec: Option<ProvidedSpec>,
    pub approved_spec: ApprovedSpec,
    pub learning_spec: LearningSpec,
    pub approved_path_trie: PathTrie<MethodSet>,
    pub provided_path_trie: PathTrie<MethodSet>,
    /// Learned concrete paths and the methods observed on them
    pub learning_path_trie: PathTrie<MethodSet>,
}

impl SpecInfo {
    fn new(host: String, port: String, separator: &str) -> Self {
        Self {
            host,
            port,
            id: SpecId::new(),
            provided_spec: None,
            approved_spec: ApprovedSpec::new(),
            learning_spec: LearningSpec::new(),
            approved_path_trie: PathTrie::with_separator(separator),
            provided_path_trie: PathTrie::with_separator(separator),
            learning_path_trie: PathTrie::with_separator(separator),
        }
    }

    /// `host:port`, or just the host when no port is known
    fn document_host(&self) -> Option<String> {
        match (self.host.is_empty(), self.port.is_empty()) {
            (true, _) => None,
            (false, true) => Some(self.host.clone()),
            (false, false) => Some(format!("{}:{}", self.host, self.port)),
        }
    }
}

/// Spec state of one monitored service
pub struct Spec {
    info: Mutex<SpecInfo>,
    config: SpeculatorConfig,
    generator: Arc<dyn OperationGenerator>,
    merger: Arc<dyn OperationMerger>,
    definitions: Arc<dyn DefinitionsStrategy>,
}

impl fmt::Debug for Spec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Spec");
        match self.info.try_lock() {
            Ok(info) => s.field("host", &info.host).field("port", &info.port).field("id", &info.id),
            Err(_) => s.field("info", &"<locked>"),
        };
        s.field("config", &self.config).finish()
    }
}

fn build_trie<'a>(
    separator: &str,
    paths: impl IntoIterator<Item = (&'a String, &'a PathItem)>,
) -> PathTrie<MethodSet> {
    let mut trie = PathTrie::with_separator(separator);
    for (template, item) in paths {
        trie.insert(template, item.methods());
    }
    trie
}

impl Spec {
    /// Spec with the default configuration and strategies
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self::with_config(host, port, SpeculatorConfig::default())
    }

    pub fn with_config(
        host: impl Into<String>,
        port: impl Into<String>,
        config: SpeculatorConfig,
    ) -> Self {
        Self {
            info: Mutex::new(SpecInfo::new(
                host.into(),
                port.into(),
                &config.path_separator,
            )),
            config,
            generator: Arc::new(TelemetryOperationGenerator),
            merger: Arc::new(UnionMerger),
            definitions: Arc::new(StructuralDefinitions),
        }
    }

    /// Replace the strategy that turns telemetry into operations
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn OperationGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Replace the strategy that combines a learned operation with the recorded one
    #[must_use]
    pub fn with_merger(mut self, merger: Arc<dyn OperationMerger>) -> Self {
        self.merger = merger;
        self
    }

    /// Replace the strategy that factors schemas into `definitions` when rendering
    #[must_use]
    pub fn with_definitions_strategy(mut self, definitions: Arc<dyn DefinitionsStrategy>) -> Self {
        self.definitions = definitions;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SpeculatorConfig {
        &self.config
    }

    /// Lock for mutation; a poisoned lock is taken over and unpoisoned
    fn lock(&self) -> MutexGuard<'_, SpecInfo> {
        let guard = self.info.lock().unwrap_or_else(PoisonError::into_inner);
        if self.info.is_poisoned() {
            warn!("recovering spec state from a poisoned lock");
            self.info.clear_poison();
        }
        guard
    }

    /// Lock for reads that do not copy layers out
    fn lock_read(&self) -> MutexGuard<'_, SpecInfo> {
        self.info.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock for reads that copy state out
    fn lock_for_copy(&self) -> Result<MutexGuard<'_, SpecInfo>, SpecError> {
        self.info
            .lock()
            .map_err(|_| SpecError::Clone("spec lock was poisoned by an earlier panic".to_string()))
    }

    #[must_use]
    pub fn host(&self) -> String {
        self.lock_read().host.clone()
    }

    #[must_use]
    pub fn port(&self) -> String {
        self.lock_read().port.clone()
    }

    #[must_use]
    pub fn id(&self) -> SpecId {
        self.lock_read().id
    }

    /// `true` if the approved layer has at least one path item
    #[must_use]
    pub fn has_approved_spec(&self) -> bool {
        !self.lock_read().approved_spec.is_empty()
    }

    /// `true` if a provided spec is loaded and has at least one path
    #[must_use]
    pub fn has_provided_spec(&self) -> bool {
        self.lock_read()
            .provided_spec
            .as_ref()
            .is_some_and(ProvidedSpec::has_paths)
    }

    /// Reset the approved and learning layers and their tries
    pub fn unset_approved_spec(&self) {
        let mut info = self.lock();
        info.approved_spec = ApprovedSpec::new();
        info.learning_spec = LearningSpec::new();
        info.approved_path_trie = PathTrie::with_separator(self.config.path_separator.as_str());
        info.learning_path_trie = PathTrie::with_separator(self.config.path_separator.as_str());
        info!(
            spec_id = %info.id,
            host = %info.host,
            port = %info.port,
            "approved and learning specs reset"
        );
    }

    /// Drop the provided layer and its trie
    pub fn unset_provided_spec(&self) {
        let mut info = self.lock();
        info.provided_spec = None;
        info.provided_path_trie = PathTrie::with_separator(self.config.path_separator.as_str());
        info!(
            spec_id = %info.id,
            host = %info.host,
            port = %info.port,
            "provided spec reset"
        );
    }

    /// Replace the approved layer
    pub fn set_approved_spec(&self, approved: ApprovedSpec) {
        let trie = build_trie(&self.config.path_separator, &approved.path_items);
        let mut info = self.lock();
        info.approved_spec = approved;
        info.approved_path_trie = trie;
        info!(paths = info.approved_spec.path_items.len(), "approved spec replaced");
    }

    /// Promote a snapshot of the learning layer to the approved layer
    pub fn approve_learning_spec(&self) {
        let mut info = self.lock();
        let approved = info.learning_spec.clone();
        info.approved_path_trie = build_trie(&self.config.path_separator, &approved.path_items);
        info.approved_spec = approved;
        info!(
            paths = info.approved_spec.path_items.len(),
            "learning spec promoted to approved"
        );
    }

    /// Parse, validate and install a Swagger 2.0 document (JSON or YAML) as the provided layer
    ///
    /// # Errors
    ///
    /// [`SpecError::ProvidedSpecLoad`] if the bytes are not a document,
    /// [`SpecError::SpecValidation`] if the document is invalid. The previous provided layer is
    /// kept in both cases.
    pub fn load_provided_spec(&self, raw: &[u8]) -> Result<(), SpecError> {
        let value: Value =
            serde_yaml::from_slice(raw).map_err(|e| SpecError::ProvidedSpecLoad(e.to_string()))?;
        validate_document_with_separator(&value, &self.config.path_separator)
            .map_err(SpecError::SpecValidation)?;
        let document: SwaggerDocument =
            serde_json::from_value(value).map_err(|e| SpecError::ProvidedSpecLoad(e.to_string()))?;

        let trie = build_trie(&self.config.path_separator, &document.paths);
        let mut info = self.lock();
        info!(
            spec_id = %info.id,
            paths = document.paths.len(),
            title = %document.info.title,
            "provided spec loaded"
        );
        info.provided_spec = Some(ProvidedSpec { spec: document });
        info.provided_path_trie = trie;
        Ok(())
    }

    /// Template of the approved layer that describes `path`, with its methods
    #[must_use]
    pub fn resolve_approved_path(&self, path: &str) -> Option<(String, MethodSet)> {
        resolve(&self.lock_read().approved_path_trie, path)
    }

    /// Template of the provided layer that describes `path`, with its methods
    #[must_use]
    pub fn resolve_provided_path(&self, path: &str) -> Option<(String, MethodSet)> {
        resolve(&self.lock_read().provided_path_trie, path)
    }

    /// Learned path matching `path`, with the methods observed on it
    #[must_use]
    pub fn resolve_learning_path(&self, path: &str) -> Option<(String, MethodSet)> {
        resolve(&self.lock_read().learning_path_trie, path)
    }

    /// Snapshot of the learning layer
    ///
    /// # Errors
    ///
    /// [`SpecError::Clone`] if the lock is poisoned.
    pub fn learning_spec(&self) -> Result<LearningSpec, SpecError> {
        Ok(self.lock_for_copy()?.learning_spec.clone())
    }

    /// Snapshot of the approved layer
    ///
    /// # Errors
    ///
    /// [`SpecError::Clone`] if the lock is poisoned.
    pub fn approved_spec(&self) -> Result<ApprovedSpec, SpecError> {
        Ok(self.lock_for_copy()?.approved_spec.clone())
    }

    /// Fold one observed exchange into the learning layer
    ///
    /// # Errors
    ///
    /// [`SpecError::TelemetryConversion`] if the sample cannot be described; the learning
    /// layer is left untouched.
    pub fn learn_telemetry(&self, telemetry: &Telemetry) -> Result<(), SpecError> {
        let raw_method = telemetry.request.method.as_str();
        let (path, _) = path_and_query(&telemetry.request.path);
        let conversion_error = |source| SpecError::TelemetryConversion {
            method: raw_method.to_string(),
            path: path.to_string(),
            source,
        };

        // a concrete path must not read as a template
        let templated = path
            .split(self.config.path_separator.as_str())
            .any(is_path_param);
        if !path.starts_with('/') || templated {
            return Err(conversion_error(GenerateError::InvalidPath(path.to_string())));
        }
        let method: HttpMethod = raw_method
            .parse()
            .map_err(|_| conversion_error(GenerateError::UnsupportedMethod(raw_method.to_string())))?;

        let mut info = self.lock();

        let mut security_definitions = info.learning_spec.security_definitions.clone();
        let operation = self
            .generator
            .generate(telemetry, &mut security_definitions)
            .map_err(conversion_error)?;

        let item = info
            .learning_spec
            .path_items
            .entry(path.to_string())
            .or_default();
        let merged = match item.operation(method) {
            Some(existing) => self.merger.merge(existing, &operation),
            None => operation,
        };
        item.set_operation(method, merged);

        info.learning_spec.security_definitions = security_definitions;
        let is_new = info
            .learning_path_trie
            .insert_merge(path, MethodSet::from([method]), |methods, new| {
                methods.extend(new);
            });

        debug!(
            method = %method,
            path,
            new_path = is_new,
            request_id = %telemetry.request_id,
            "telemetry learned"
        );
        Ok(())
    }

    /// Render the approved layer as a validated Swagger 2.0 document
    ///
    /// # Errors
    ///
    /// [`SpecError::Clone`] if the lock is poisoned, [`SpecError::SpecValidation`] if the
    /// assembled document is invalid.
    pub fn generate_document(&self) -> Result<SwaggerDocument, SpecError> {
        self.render().map(|(document, _)| document)
    }

    /// Compact JSON encoding of [`Spec::generate_document`]
    pub fn generate_document_json(&self) -> Result<Vec<u8>, SpecError> {
        let (_, value) = self.render()?;
        serde_json::to_vec(&value).map_err(|e| SpecError::Serialization(e.to_string()))
    }

    /// YAML encoding of [`Spec::generate_document`]
    pub fn generate_document_yaml(&self) -> Result<String, SpecError> {
        let (_, value) = self.render()?;
        serde_yaml::to_string(&value).map_err(|e| SpecError::Serialization(e.to_string()))
    }

    fn render(&self) -> Result<(SwaggerDocument, Value), SpecError> {
        let info = self.lock_for_copy()?;

        let mut paths: BTreeMap<String, PathItem> = info.approved_spec.path_items.clone();
        let definitions = self.definitions.factor(&mut paths);

        let document = SwaggerDocument {
            swagger: SWAGGER_VERSION.to_string(),
            info: self.config.info(),
            host: info.document_host(),
            paths,
            definitions,
            security_definitions: info.approved_spec.security_definitions.clone(),
            ..SwaggerDocument::default()
        };

        let value =
            serde_json::to_value(&document).map_err(|e| SpecError::Serialization(e.to_string()))?;
        if let Err(issues) = validate_document_with_separator(&value, &self.config.path_separator) {
            error!(
                host = %info.host,
                port = %info.port,
                issues = issues.len(),
                document = %value,
                "generated document failed validation"
            );
            return Err(SpecError::SpecValidation(issues));
        }

        Ok((document, value))
    }

    /// Independent deep copy with the same strategies and a fresh lock
    ///
    /// # Errors
    ///
    /// [`SpecError::Clone`] if the lock is poisoned.
    pub fn clone_spec_info(&self) -> Result<Spec, SpecError> {
        let info = self.lock_for_copy()?.clone();
        Ok(Spec {
            info: Mutex::new(info),
            config: self.config.clone(),
            generator: Arc::clone(&self.generator),
            merger: Arc::clone(&self.merger),
            definitions: Arc::clone(&self.definitions),
        })
    }
}

fn resolve(trie: &PathTrie<MethodSet>, path: &str) -> Option<(String, MethodSet)> {
    let (path, _) = path_and_query(path);
    trie.get_path_and_value(path)
        .map(|(template, methods)| (template.to_string(), methods.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::telemetry::{TelemetryRequest, TelemetryResponse};
    use std::thread;

    fn sample(method: &str, path: &str) -> Telemetry {
        Telemetry::new(TelemetryRequest::new(method, path), TelemetryResponse::new("200"))
    }

    fn poison(spec: &Spec) {
        let result = thread::scope(|s| {
            s.spawn(|| {
                let _guard = spec.info.lock().unwrap();
                panic!("poison the lock");
            })
            .join()
        });
        assert!(result.is_err());
        assert!(spec.info.is_poisoned());
    }

    #[test]
    fn test_document_host() {
        let info = SpecInfo::new("api".into(), "80".into(), "/");
        assert_eq!(info.document_host().as_deref(), Some("api:80"));
        let info = SpecInfo::new("api".into(), String::new(), "/");
        assert_eq!(info.document_host().as_deref(), Some("api"));
        let info = SpecInfo::new(String::new(), "80".into(), "/");
        assert_eq!(info.document_host(), None);
    }

    #[test]
    fn test_learning_trie_accumulates_methods() {
        let spec = Spec::new("h", "1");
        spec.learn_telemetry(&sample("GET", "/pets?x=1")).unwrap();
        spec.learn_telemetry(&sample("POST", "/pets")).unwrap();
        let (path, methods) = spec.resolve_learning_path("/pets?y=2").unwrap();
        assert_eq!(path, "/pets");
        assert_eq!(methods, MethodSet::from([HttpMethod::Get, HttpMethod::Post]));
    }

    #[test]
    fn test_relative_path_is_rejected() {
        let spec = Spec::new("h", "1");
        let err = spec.learn_telemetry(&sample("OPTIONS", "*")).unwrap_err();
        assert!(matches!(
            err,
            SpecError::TelemetryConversion {
                source: GenerateError::InvalidPath(_),
                ..
            }
        ));
        assert!(spec.learning_spec().unwrap().is_empty());
    }

    #[test]
    fn test_poisoned_lock_refuses_copies_until_next_mutation() {
        let spec = Spec::new("h", "1");
        spec.learn_telemetry(&sample("GET", "/a")).unwrap();
        poison(&spec);

        assert!(matches!(spec.generate_document_json(), Err(SpecError::Clone(_))));
        assert!(matches!(spec.clone_spec_info(), Err(SpecError::Clone(_))));
        assert!(matches!(spec.learning_spec(), Err(SpecError::Clone(_))));

        assert!(spec.resolve_learning_path("/a").is_some());
        assert!(spec.info.is_poisoned());

        spec.learn_telemetry(&sample("GET", "/b")).unwrap();
        assert!(!spec.info.is_poisoned());
        assert_eq!(spec.learning_spec().unwrap().path_items.len(), 2);
        spec.approve_learning_spec();
        assert!(spec.generate_document_json().is_ok());
        assert!(spec.clone_spec_info().is_ok());
    }

    #[test]
    fn test_templated_request_path_is_rejected() {
        let spec = Spec::new("h", "1");
        spec.learn_telemetry(&sample("GET", "/files/a.txt")).unwrap();
        let err = spec.learn_telemetry(&sample("GET", "/files/{name}")).unwrap_err();
        assert!(matches!(
            err,
            SpecError::TelemetryConversion {
                source: GenerateError::InvalidPath(_),
                ..
            }
        ));
        assert!(spec.resolve_learning_path("/files/{name}").is_none());

        spec.approve_learning_spec();
        let json = spec.generate_document_json().unwrap();
        let doc: Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(doc["paths"].as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_custom_separator_from_config() {
        let config = SpeculatorConfig {
            path_separator: ".".to_string(),
            ..SpeculatorConfig::default()
        };
        let spec = Spec::with_config("h", "1", config);
        let mut approved = ApprovedSpec::new();
        approved.add_path_item("/svc.{id}", PathItem::default());
        spec.set_approved_spec(approved);
        assert_eq!(
            spec.resolve_approved_path("/svc.42").map(|(t, _)| t).as_deref(),
            Some("/svc.{id}")
        );
    }
}
