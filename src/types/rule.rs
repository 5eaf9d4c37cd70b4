use super::criterion::GroupedCriterion;
use super::predicate::PredicateMap;
use super::property::Property;

/// One scoped set of field assignments guarded by a conjunction of grouped
/// criteria.
///
/// Rules are created by the compiler, ordered by the priority sorter, and
/// immutable afterwards. The criteria of a sorted rule are in descending
/// rank order.
#[derive(Debug)]
pub(crate) struct Rule {
    pub(crate) criteria: Vec<GroupedCriterion>,
    pub(crate) values: FieldMap,
}

impl Rule {
    /// A rule matches when every grouped criterion matches.
    pub(crate) fn matches(&self, predicates: &PredicateMap) -> bool {
        self.criteria
            .iter()
            .all(|criterion| criterion.matches(predicates))
    }
}

/// An insertion-ordered field name → property map with one entry per name.
#[derive(Debug, Default)]
pub(crate) struct FieldMap {
    entries: Vec<(String, Property)>,
}

impl FieldMap {
    /// Insert a field, replacing an existing entry with the same name in
    /// place.
    pub(crate) fn insert(&mut self, name: impl Into<String>, property: Property) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = property,
            None => self.entries.push((name, property)),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sole entry of a single-field map, used for list sub-fields.
    pub(crate) fn first(&self) -> Option<(&str, &Property)> {
        self.entries
            .first()
            .map(|(name, property)| (name.as_str(), property))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.entries
            .iter()
            .map(|(name, property)| (name.as_str(), property))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Property)> {
        self.entries
            .iter_mut()
            .map(|(name, property)| (name.as_str(), property))
    }
}
