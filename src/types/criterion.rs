use std::collections::BTreeSet;

use super::predicate::PredicateMap;

/// Identity of a criterion: its name plus whether the match is negated.
///
/// `'color-blue'` and `'!color-blue'` carry the same name but different
/// identities; they rank equally in a namespace's priorities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CriterionId {
    pub(crate) name: String,
    pub(crate) negated: bool,
}

/// A single criterion as written in config, e.g. `'color-blue'` parses to
/// name `color`, value `blue`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CriterionDef {
    pub(crate) id: CriterionId,
    pub(crate) value: String,
}

impl CriterionDef {
    /// Parse the textual form `[!]<name>-<value>`.
    ///
    /// The first `-` after the optional `!` separates name from value; both
    /// sides must be non-empty. Returns `None` for anything else, in which
    /// case the caller treats the text as a plain data field name.
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let (negated, rest) = match input.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, input),
        };
        let separator = rest.find('-')?;
        if separator == 0 || separator == rest.len() - 1 {
            return None;
        }
        Some(CriterionDef {
            id: CriterionId {
                name: rest[..separator].to_owned(),
                negated,
            },
            value: rest[separator + 1..].to_owned(),
        })
    }
}

/// An OR over criterion values sharing one identity: `'color-blue':
/// 'color-red'::{…}` groups to name `color`, values `{blue, red}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupedCriterion {
    pub(crate) id: CriterionId,
    pub(crate) values: BTreeSet<String>,
}

impl GroupedCriterion {
    /// Test this group against the caller's predicates. A missing predicate
    /// counts as always-false, so a negated group with no predicate matches.
    pub(crate) fn matches(&self, predicates: &PredicateMap) -> bool {
        let passed = predicates
            .get(&self.id.name)
            .is_some_and(|predicate| predicate.test(&self.values));
        passed != self.id.negated
    }
}
