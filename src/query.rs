use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;

use crate::types::engine::ConfigEngine;
use crate::types::error::ConfigError;
use crate::types::predicate::{CriteriaPredicate, PredicateMap};
use crate::types::value::{Value, ValueKind};

/// A facade over one namespace of a [`ConfigEngine`], carrying default
/// predicates so callers do not have to pass them on every lookup.
///
/// The default-predicate result map is evaluated once at construction;
/// queries that add nothing reuse it without re-evaluating the engine.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cascade_config::{ConfigEngine, NamespacedConfig};
///
/// let engine = Arc::new(ConfigEngine::from_document(
///     "inline",
///     cascade_config::parse_document(
///         r#"
///         namespace::Example::{ prioritizedCriteria: [domain] }
///         Example::{
///             greeting: "hello",
///             'domain-test': { greeting: "hello, test" },
///         }
///         "#,
///     )?,
/// )?);
///
/// let config = NamespacedConfig::builder(engine, "Example")
///     .default_property("domain", "test")
///     .build();
/// assert_eq!(
///     config.query().find::<String>("greeting"),
///     Some("hello, test".to_owned())
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct NamespacedConfig {
    engine: Arc<ConfigEngine>,
    namespace: String,
    default_predicates: PredicateMap,
    default_values: HashMap<String, Value>,
}

/// Builder for [`NamespacedConfig`]. Default properties become per-key
/// equality predicates and override default predicates with the same key.
#[derive(Debug)]
pub struct NamespacedConfigBuilder {
    engine: Arc<ConfigEngine>,
    namespace: String,
    default_properties: HashMap<String, String>,
    default_predicates: PredicateMap,
}

impl NamespacedConfigBuilder {
    #[must_use]
    pub fn default_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_properties.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn default_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.default_properties.extend(properties);
        self
    }

    #[must_use]
    pub fn default_predicate(
        mut self,
        key: impl Into<String>,
        predicate: CriteriaPredicate,
    ) -> Self {
        self.default_predicates.insert(key.into(), predicate);
        self
    }

    #[must_use]
    pub fn build(self) -> NamespacedConfig {
        let mut default_predicates = self.default_predicates;
        default_predicates.extend(CriteriaPredicate::from_properties(&self.default_properties));
        let default_values = self
            .engine
            .values_for_predicates(&self.namespace, &default_predicates);
        NamespacedConfig {
            engine: self.engine,
            namespace: self.namespace,
            default_predicates,
            default_values,
        }
    }
}

impl NamespacedConfig {
    /// A facade with no default predicates.
    #[must_use]
    pub fn new(engine: Arc<ConfigEngine>, namespace: impl Into<String>) -> Self {
        Self::builder(engine, namespace).build()
    }

    #[must_use]
    pub fn builder(
        engine: Arc<ConfigEngine>,
        namespace: impl Into<String>,
    ) -> NamespacedConfigBuilder {
        NamespacedConfigBuilder {
            engine,
            namespace: namespace.into(),
            default_properties: HashMap::new(),
            default_predicates: PredicateMap::new(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Start a query against this namespace.
    #[must_use]
    pub fn query(&self) -> Query<'_> {
        Query {
            config: self,
            additional_predicates: PredicateMap::new(),
            additional_properties: HashMap::new(),
            properties_added: false,
            cache_results: false,
            cached: None,
        }
    }

    /// Evaluate with the defaults plus the given predicates. Reuses the
    /// precomputed default result when there is nothing new to apply.
    fn lookup(&self, additional: &PredicateMap) -> HashMap<String, Value> {
        if additional.is_empty() {
            return self.default_values.clone();
        }
        let mut combined = self.default_predicates.clone();
        combined.extend(
            additional
                .iter()
                .map(|(key, predicate)| (key.clone(), predicate.clone())),
        );
        self.engine.values_for_predicates(&self.namespace, &combined)
    }
}

/// One lookup against a [`NamespacedConfig`]: extra properties or predicates
/// layered over the defaults, an optional result cache, and typed finds.
#[derive(Debug)]
pub struct Query<'a> {
    config: &'a NamespacedConfig,
    additional_predicates: PredicateMap,
    additional_properties: HashMap<String, BTreeSet<String>>,
    properties_added: bool,
    cache_results: bool,
    cached: Option<HashMap<String, Value>>,
}

impl Query<'_> {
    /// Allow one more value for a property key. Repeated calls with the
    /// same key accumulate into a value set rather than overwriting.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_properties
            .entry(key.into())
            .or_default()
            .insert(value.into());
        self.properties_added = true;
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: &HashMap<String, String>) -> Self {
        for (key, value) in properties {
            self = self.with_property(key.clone(), value.clone());
        }
        self
    }

    #[must_use]
    pub fn with_predicate(mut self, key: impl Into<String>, predicate: CriteriaPredicate) -> Self {
        self.additional_predicates.insert(key.into(), predicate);
        self.cached = None;
        self
    }

    #[must_use]
    pub fn with_predicates(mut self, predicates: PredicateMap) -> Self {
        self.additional_predicates.extend(predicates);
        self.cached = None;
        self
    }

    /// Keep the evaluated result between `find` calls until the query's
    /// properties or predicates change.
    #[must_use]
    pub fn cache_results(mut self) -> Self {
        self.cache_results = true;
        self
    }

    /// Re-evaluate on every `find` call (the default).
    #[must_use]
    pub fn do_not_cache_results(mut self) -> Self {
        self.cache_results = false;
        self
    }

    /// Drop every added property and predicate, keeping only the defaults.
    pub fn clear(&mut self) {
        self.additional_predicates.clear();
        self.additional_properties.clear();
        self.properties_added = false;
        self.cached = None;
    }

    /// Find the value for a key, converted to `T`. Returns `None` when the
    /// key is missing or the value is null or of the wrong category.
    pub fn find<T: FromValue>(&mut self, key: &str) -> Option<T> {
        self.values().get(key).and_then(T::from_value)
    }

    /// Like [`find`](Self::find), promoting absence into an error naming
    /// the namespace, key, and requested type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValueNotFound`] when no convertible value
    /// exists.
    pub fn get<T: FromValue>(&mut self, key: &str) -> Result<T, ConfigError> {
        self.find(key).ok_or_else(|| ConfigError::ValueNotFound {
            namespace: self.config.namespace.clone(),
            key: key.to_owned(),
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Deserialize the value for a key into a user-defined record type.
    /// Missing keys and null values yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Deserialize`] when the value exists but does
    /// not fit `T`.
    pub fn find_as<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, ConfigError> {
        match self.values().get(key) {
            None => Ok(None),
            Some(value) if value.is_null() => Ok(None),
            Some(value) => crate::de::from_value(value).map(Some).map_err(|source| {
                ConfigError::Deserialize {
                    key: key.to_owned(),
                    message: source.to_string(),
                }
            }),
        }
    }

    /// Every key-value pair matching this query.
    pub fn find_all(&mut self) -> HashMap<String, Value> {
        self.values().clone()
    }

    fn values(&mut self) -> &HashMap<String, Value> {
        if self.properties_added {
            self.additional_predicates.extend(
                CriteriaPredicate::from_property_sets(&self.additional_properties),
            );
            self.additional_properties.clear();
            self.properties_added = false;
            self.cached = None;
        }
        if !self.cache_results {
            self.cached = None;
        }
        let config = self.config;
        let predicates = &self.additional_predicates;
        self.cached
            .get_or_insert_with(|| config.lookup(predicates))
    }
}

/// Conversion from a data-tree value into a concrete Rust type. Adapters
/// return `None` for values of the wrong category instead of coercing.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_text().map(ToOwned::to_owned)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i128 {
    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        i128::from_value(value).and_then(|i| i.try_into().ok())
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i128::from_value(value).and_then(|i| i.try_into().ok())
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Decimal(d) => Some(*d),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl FromValue for DateTime<FixedOffset> {
    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Option<Self> {
        match value.kind() {
            ValueKind::Blob(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}
