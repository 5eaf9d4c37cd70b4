use std::collections::HashMap;

use crate::types::predicate::PredicateMap;
use crate::types::property::Property;
use crate::types::rule::Rule;
use crate::types::value::{Struct, Value, ValueKind};

/// Evaluate a sorted rule vector into a name → value map.
pub(crate) fn evaluate(rules: &[Rule], predicates: &PredicateMap) -> HashMap<String, Value> {
    cascade(rules, predicates)
        .into_iter()
        .map(|(name, property)| (name.to_owned(), materialize(property, predicates)))
        .collect()
}

/// Scan the sorted rules in order, aggregating the fields of every matching
/// rule. Later matches overwrite earlier ones per field, which is the
/// cascade: the vector is ordered least-specific first.
fn cascade<'a>(rules: &'a [Rule], predicates: &PredicateMap) -> Vec<(&'a str, &'a Property)> {
    let mut aggregated: Vec<(&str, &Property)> = Vec::new();
    for rule in rules {
        if rule.matches(predicates) {
            for (name, property) in rule.values.iter() {
                match aggregated.iter_mut().find(|(existing, _)| *existing == name) {
                    Some(slot) => slot.1 = property,
                    None => aggregated.push((name, property)),
                }
            }
        }
    }
    aggregated
}

/// Produce the value of a property under the caller's predicates.
fn materialize(property: &Property, predicates: &PredicateMap) -> Value {
    match property {
        Property::Basic(value) => value.clone(),
        Property::DynamicStruct(rules) => {
            let fields: Struct = cascade(rules, predicates)
                .into_iter()
                .map(|(name, nested)| (name.to_owned(), materialize(nested, predicates)))
                .collect();
            Value::from(fields)
        }
        Property::DynamicList(properties) => {
            let mut elements = Vec::with_capacity(properties.len());
            for element in properties {
                extend_from_element(element, predicates, &mut elements);
            }
            Value::from(elements)
        }
        // The compiler only places sub-fields inside dynamic lists.
        Property::DynamicSubField(_) => {
            unreachable!("sub-fields are only materialized in list context")
        }
    }
}

/// Append a list element's contribution: sub-fields contribute the first
/// matching rule's `value` (one element) or `values` (spliced), or nothing;
/// every other property contributes exactly one element.
///
/// First-match selection matters for OR'd sub-fields: each disjunct compiles
/// to its own rule with an identical payload, and only one of them may
/// contribute.
fn extend_from_element(property: &Property, predicates: &PredicateMap, out: &mut Vec<Value>) {
    let Property::DynamicSubField(rules) = property else {
        out.push(materialize(property, predicates));
        return;
    };

    let Some(matched) = rules.iter().find(|rule| rule.matches(predicates)) else {
        return;
    };
    let Some((field_name, chosen)) = matched.values.first() else {
        return;
    };
    if field_name == "value" {
        out.push(materialize(chosen, predicates));
    } else if let ValueKind::List(elements) = materialize(chosen, predicates).into_kind() {
        out.extend(elements);
    }
}
