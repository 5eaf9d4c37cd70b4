use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// A map of criterion names to the predicates that decide them. Criteria
/// whose name is absent from the map are treated as always-false.
pub type PredicateMap = HashMap<String, CriteriaPredicate>;

/// A caller-supplied test over the set of values configured for a criterion.
///
/// The engine invokes a predicate once per grouped criterion encountered
/// during a rule scan. Predicates should be side-effect free; ones that are
/// not (e.g. counting invocations) must not rely on call order.
#[derive(Clone)]
pub struct CriteriaPredicate {
    test: Arc<dyn Fn(&BTreeSet<String>) -> bool + Send + Sync>,
}

impl CriteriaPredicate {
    /// Wrap an arbitrary closure over the configured value set.
    pub fn new(test: impl Fn(&BTreeSet<String>) -> bool + Send + Sync + 'static) -> Self {
        CriteriaPredicate {
            test: Arc::new(test),
        }
    }

    /// A predicate that never matches.
    #[must_use]
    pub fn always_false() -> Self {
        Self::new(|_| false)
    }

    /// Matches when the configured values contain the given value.
    pub fn from_value(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(move |values| values.contains(&value))
    }

    /// Matches when the configured values intersect the given values. An
    /// empty collection never matches.
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        Self::new(move |configured| !values.is_disjoint(configured))
    }

    /// Matches when any single configured value satisfies the condition.
    pub fn from_condition(condition: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self::new(move |values| values.iter().any(|value| condition(value)))
    }

    /// Test the configured value set for a criterion.
    #[must_use]
    pub fn test(&self, values: &BTreeSet<String>) -> bool {
        (self.test)(values)
    }

    /// Convert a property map into per-key equality predicates.
    #[must_use]
    pub fn from_properties(properties: &HashMap<String, String>) -> PredicateMap {
        properties
            .iter()
            .map(|(key, value)| (key.clone(), Self::from_value(value.clone())))
            .collect()
    }

    /// Convert a map of allowed value sets into per-key intersection
    /// predicates.
    #[must_use]
    pub fn from_property_sets(properties: &HashMap<String, BTreeSet<String>>) -> PredicateMap {
        properties
            .iter()
            .map(|(key, values)| (key.clone(), Self::from_values(values.iter().cloned())))
            .collect()
    }
}

impl fmt::Debug for CriteriaPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CriteriaPredicate")
    }
}
