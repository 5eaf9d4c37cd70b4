use std::collections::{BTreeSet, HashMap};

use crate::compile::CompiledConfig;
use crate::types::error::ConfigError;
use crate::types::property::Property;
use crate::types::rule::Rule;

/// Validate and order every rule vector so that a linear scan yields
/// CSS-like specificity, then freeze the result as the engine's namespaces.
///
/// Per namespace, per rule vector (top-level plus every `DynamicStruct` and
/// `DynamicSubField` body): criteria not in `prioritizedCriteria` are fatal,
/// rules with no values are dropped, each rule's criteria sort descending by
/// rank, and the vector sorts ascending by specificity with compile order
/// breaking ties.
pub(crate) fn sort_namespaces(
    compiled: CompiledConfig,
) -> Result<HashMap<String, Vec<Rule>>, ConfigError> {
    let CompiledConfig {
        priorities,
        mut namespaces,
    } = compiled;

    let mut undeclared: Vec<String> = namespaces
        .keys()
        .filter(|namespace| !priorities.contains_key(*namespace))
        .cloned()
        .collect();
    if !undeclared.is_empty() {
        undeclared.sort();
        return Err(ConfigError::UndeclaredNamespaces {
            namespaces: undeclared,
        });
    }

    for (namespace, rules) in &mut namespaces {
        let ranks: HashMap<&str, usize> = priorities[namespace.as_str()]
            .iter()
            .enumerate()
            .map(|(rank, name)| (name.as_str(), rank))
            .collect();
        sort_rules(namespace, rules, &ranks)?;
    }

    // Namespaces declared without content still resolve (to nothing).
    for namespace in priorities.into_keys() {
        namespaces.entry(namespace).or_default();
    }

    Ok(namespaces)
}

fn sort_rules(
    namespace: &str,
    rules: &mut Vec<Rule>,
    ranks: &HashMap<&str, usize>,
) -> Result<(), ConfigError> {
    // Unknown criteria are checked before elision so that an empty rule
    // guarded by a bad criterion still fails the build.
    let unknown: BTreeSet<&str> = rules
        .iter()
        .flat_map(|rule| rule.criteria.iter())
        .map(|criterion| criterion.id.name.as_str())
        .filter(|name| !ranks.contains_key(name))
        .collect();
    if !unknown.is_empty() {
        return Err(ConfigError::UnknownCriteria {
            namespace: namespace.to_owned(),
            names: unknown.into_iter().map(ToOwned::to_owned).collect(),
        });
    }

    rules.retain(|rule| !rule.values.is_empty());

    for rule in rules.iter_mut() {
        rule.criteria
            .sort_by(|a, b| ranks[b.id.name.as_str()].cmp(&ranks[a.id.name.as_str()]));
        for (_, property) in rule.values.iter_mut() {
            sort_property(namespace, property, ranks)?;
        }
    }

    // With criteria in descending rank order, comparing the rank sequences
    // lexicographically orders rules exactly as the weighted specificity
    // score would: any rule led by a higher-priority criterion outranks
    // every combination of lower ones, and a longer sequence beats its own
    // prefix. The sort is stable, so equal sequences keep compile order.
    rules.sort_by_cached_key(|rule| {
        rule.criteria
            .iter()
            .map(|criterion| ranks[criterion.id.name.as_str()])
            .collect::<Vec<usize>>()
    });

    Ok(())
}

fn sort_property(
    namespace: &str,
    property: &mut Property,
    ranks: &HashMap<&str, usize>,
) -> Result<(), ConfigError> {
    match property {
        Property::Basic(_) => Ok(()),
        Property::DynamicStruct(rules) | Property::DynamicSubField(rules) => {
            sort_rules(namespace, rules, ranks)
        }
        Property::DynamicList(properties) => {
            for element in properties {
                sort_property(namespace, element, ranks)?;
            }
            Ok(())
        }
    }
}
