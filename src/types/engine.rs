use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use super::error::ConfigError;
use super::predicate::{CriteriaPredicate, PredicateMap};
use super::record::ConfigRecord;
use super::rule::Rule;
use super::value::Value;

const DEFAULT_DIRECTORY: &str = "ion-cascading-config";
const ALLOWED_EXTENSION: &str = "ion";

/// A compiled, immutable cascading-configuration engine. Thread-safe and
/// designed to live behind `Arc`.
///
/// Each namespace holds a rule vector sorted so that a linear scan yields
/// CSS-like specificity: later matches overwrite earlier ones, and rules
/// guarded by higher-priority criteria come later.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use cascade_config::ConfigEngine;
///
/// let engine = ConfigEngine::from_document(
///     "inline",
///     cascade_config::parse_document(
///         r#"
///         namespace::Example::{ prioritizedCriteria: [field1, field2] }
///         Example::{
///             myField: 1,
///             'field1-true': { myField: 2 },
///         }
///         "#,
///     )?,
/// )?;
///
/// let mut properties = HashMap::new();
/// properties.insert("field1".to_owned(), "true".to_owned());
/// let values = engine.values_for_properties("Example", &properties);
/// assert_eq!(values["myField"], 2_i64.into());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ConfigEngine {
    pub(crate) namespaces: HashMap<String, Vec<Rule>>,
}

impl ConfigEngine {
    /// Compile an engine from a sequence of records.
    ///
    /// Namespace declarations and content records may arrive in any order;
    /// content records for the same namespace concatenate in input order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on any malformed record; construction is
    /// all-or-nothing.
    pub fn from_records(
        records: impl IntoIterator<Item = ConfigRecord>,
    ) -> Result<Self, ConfigError> {
        let compiled = crate::compile::compile(records)?;
        let namespaces = crate::sort::sort_namespaces(compiled)?;
        debug!(
            namespaces = namespaces.len(),
            rules = namespaces.values().map(Vec::len).sum::<usize>(),
            "compiled cascading configuration"
        );
        Ok(ConfigEngine { namespaces })
    }

    /// Compile an engine from a single value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the value is malformed.
    pub fn from_value(name: impl Into<String>, value: Value) -> Result<Self, ConfigError> {
        Self::from_records([ConfigRecord::new(name, value)])
    }

    /// Compile an engine from a multi-value document sharing one record
    /// name. Prefer this over [`from_value`](Self::from_value) for parsed
    /// files, which usually hold several top-level values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any value is malformed.
    pub fn from_document(
        name: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        Self::from_records(
            values
                .into_iter()
                .map(|value| ConfigRecord::new(name.clone(), value)),
        )
    }

    /// Compile an engine from config files.
    ///
    /// Only regular files whose extension is exactly `.ion` are read;
    /// anything else is silently ignored. Files load in ascending file-name
    /// order so the compiled order is deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on I/O, parse, or compile failure.
    pub fn from_files(
        paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Result<Self, ConfigError> {
        let mut paths: Vec<PathBuf> = paths
            .into_iter()
            .map(Into::into)
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == ALLOWED_EXTENSION))
            .collect();
        paths.sort_by_key(|path| path.file_name().map(ToOwned::to_owned));

        let mut records = Vec::new();
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let record_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let values =
                crate::parse::parse_document(&text).map_err(|source| ConfigError::Parse {
                    record: record_name.clone(),
                    source,
                })?;
            debug!(file = %path.display(), values = values.len(), "loaded config file");
            records.extend(
                values
                    .into_iter()
                    .map(|value| ConfigRecord::new(record_name.clone(), value)),
            );
        }
        Self::from_records(records)
    }

    /// Compile an engine from every `.ion` file in a directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the directory cannot be listed or any file
    /// fails to load, parse, or compile.
    pub fn from_directory(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let entries = std::fs::read_dir(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?;
            files.push(entry.path());
        }
        Self::from_files(files)
    }

    /// The declared namespace names, in no particular order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Evaluate a namespace with per-key equality predicates: a criterion
    /// passes when its configured values contain the property value with
    /// the same key.
    ///
    /// A missing namespace yields an empty map.
    #[must_use]
    pub fn values_for_properties(
        &self,
        namespace: &str,
        properties: &HashMap<String, String>,
    ) -> HashMap<String, Value> {
        self.values_for_predicates(namespace, &CriteriaPredicate::from_properties(properties))
    }

    /// Evaluate a namespace with custom predicates. Criteria whose name has
    /// no predicate never pass.
    ///
    /// A missing namespace yields an empty map. Evaluation itself cannot
    /// fail, and repeated calls with an equal predicate map return equal
    /// results.
    #[must_use]
    pub fn values_for_predicates(
        &self,
        namespace: &str,
        predicates: &PredicateMap,
    ) -> HashMap<String, Value> {
        let rules = self
            .namespaces
            .get(namespace)
            .map_or(&[][..], Vec::as_slice);
        crate::evaluate::evaluate(rules, predicates)
    }
}

impl fmt::Display for ConfigEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigEngine({} namespaces, {} rules)",
            self.namespaces.len(),
            self.namespaces.values().map(Vec::len).sum::<usize>(),
        )
    }
}

static DEFAULT_ENGINE: OnceLock<ConfigEngine> = OnceLock::new();

/// The engine loaded lazily from the `ion-cascading-config` directory under
/// the current working directory.
///
/// This is a thin accessor over an explicit [`ConfigEngine::from_directory`]
/// call; nothing is loaded until first use, and code under test can ignore
/// it entirely and construct engines from explicit sources.
///
/// # Errors
///
/// Returns [`ConfigError`] if the directory cannot be loaded or compiled.
/// Failures are not cached, so a later call can succeed once the directory
/// is in place.
pub fn default_engine() -> Result<&'static ConfigEngine, ConfigError> {
    if let Some(engine) = DEFAULT_ENGINE.get() {
        return Ok(engine);
    }
    let engine = ConfigEngine::from_directory(DEFAULT_DIRECTORY)?;
    Ok(DEFAULT_ENGINE.get_or_init(|| engine))
}
