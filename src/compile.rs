use std::collections::{BTreeSet, HashMap};

use crate::types::criterion::{CriterionDef, CriterionId, GroupedCriterion};
use crate::types::error::ConfigError;
use crate::types::property::Property;
use crate::types::record::ConfigRecord;
use crate::types::rule::{FieldMap, Rule};
use crate::types::value::{Struct, Value, ValueKind};

const NAMESPACE_ANNOTATION: &str = "namespace";
const NAMESPACE_PRIORITIES_FIELD: &str = "prioritizedCriteria";
const SUB_FIELD_VALUE: &str = "value";
const SUB_FIELD_VALUES: &str = "values";

/// Everything gathered from the record stream, before the priority sort.
#[derive(Debug, Default)]
pub(crate) struct CompiledConfig {
    /// Namespace name → its `prioritizedCriteria`, least important first.
    pub(crate) priorities: HashMap<String, Vec<String>>,
    /// Namespace name → concatenated top-level rules in input order.
    pub(crate) namespaces: HashMap<String, Vec<Rule>>,
}

/// Classify and parse every record. Namespace declarations may arrive after
/// the content that uses them; validation against priorities happens in the
/// sort pass once everything has been read.
pub(crate) fn compile(
    records: impl IntoIterator<Item = ConfigRecord>,
) -> Result<CompiledConfig, ConfigError> {
    let mut compiled = CompiledConfig::default();
    for record in records {
        compile_record(record, &mut compiled)?;
    }
    Ok(compiled)
}

fn compile_record(record: ConfigRecord, compiled: &mut CompiledConfig) -> Result<(), ConfigError> {
    let ConfigRecord { name, value } = record;

    let Some(config) = value.as_struct() else {
        return Err(ConfigError::RecordNotAStruct {
            record: name,
            found: value.type_name().to_owned(),
        });
    };
    let annotations = value.annotations();
    let Some(first_annotation) = annotations.first() else {
        return Err(ConfigError::UnnamespacedRecord { record: name });
    };

    if first_annotation.eq_ignore_ascii_case(NAMESPACE_ANNOTATION) {
        return declare_namespace(&name, &value, config, annotations, compiled);
    }

    let namespace = first_annotation.clone();
    let rules = parse_rules(&name, config, &[])?;
    compiled
        .namespaces
        .entry(namespace)
        .or_default()
        .extend(rules);
    Ok(())
}

fn declare_namespace(
    record: &str,
    value: &Value,
    config: &Struct,
    annotations: &[String],
    compiled: &mut CompiledConfig,
) -> Result<(), ConfigError> {
    let shape_error = || ConfigError::NamespaceShape {
        record: record.to_owned(),
        found: value.to_string(),
    };

    if annotations.len() != 2 {
        return Err(shape_error());
    }
    let namespace = annotations[1].clone();
    if compiled.priorities.contains_key(&namespace) {
        return Err(ConfigError::DuplicateNamespace {
            record: record.to_owned(),
            namespace,
        });
    }

    let raw_priorities = config
        .get(NAMESPACE_PRIORITIES_FIELD)
        .and_then(Value::as_list)
        .ok_or_else(shape_error)?;
    let mut priorities = Vec::with_capacity(raw_priorities.len());
    for priority in raw_priorities {
        let text = priority.as_text().ok_or_else(shape_error)?;
        priorities.push(text.to_owned());
    }

    compiled.priorities.insert(namespace, priorities);
    Ok(())
}

/// Parse a content struct into the rule for the current criteria path plus
/// the rules produced by deeper criteria-bearing fields. An empty struct
/// produces no rules at all.
fn parse_rules(
    record: &str,
    config: &Struct,
    current_criteria: &[GroupedCriterion],
) -> Result<Vec<Rule>, ConfigError> {
    if config.is_empty() {
        return Ok(Vec::new());
    }

    let mut values = FieldMap::default();
    let mut nested = Vec::new();
    for (field_name, field_value) in config.iter() {
        // A field is either a criteria branch or a data field; data fields
        // collect only at their own nesting level.
        match CriterionDef::parse(field_name) {
            Some(definition) => nested.extend(parse_criteria_branch(
                record,
                field_value,
                current_criteria,
                Some(definition),
            )?),
            None => values.insert(field_name, parse_property(record, field_value)?),
        }
    }

    let mut rules = vec![Rule {
        criteria: current_criteria.to_vec(),
        values,
    }];
    rules.extend(nested);
    Ok(rules)
}

/// Parse a criteria-bearing struct: the optional field-name criterion plus
/// every annotation form one OR disjunction per distinct identity, and the
/// struct body is parsed once per identity with that group appended to the
/// criteria path.
fn parse_criteria_branch(
    record: &str,
    value: &Value,
    current_criteria: &[GroupedCriterion],
    field_definition: Option<CriterionDef>,
) -> Result<Vec<Rule>, ConfigError> {
    let Some(config) = value.as_struct() else {
        return Err(ConfigError::CriterionNotAStruct {
            record: record.to_owned(),
            found: value.type_name().to_owned(),
        });
    };

    // Group disjuncts by identity in first-seen order so rule insertion
    // order (the tie-break) is deterministic.
    let mut groups: Vec<(CriterionId, BTreeSet<String>)> = Vec::new();
    let mut add_disjunct = |definition: CriterionDef| {
        match groups.iter_mut().find(|(id, _)| *id == definition.id) {
            Some((_, group_values)) => {
                group_values.insert(definition.value);
            }
            None => {
                groups.push((definition.id, BTreeSet::from([definition.value])));
            }
        }
    };

    if let Some(definition) = field_definition {
        add_disjunct(definition);
    }
    for annotation in value.annotations() {
        let definition =
            CriterionDef::parse(annotation).ok_or_else(|| ConfigError::MalformedCriterion {
                record: record.to_owned(),
                input: annotation.clone(),
            })?;
        add_disjunct(definition);
    }

    let mut rules = Vec::new();
    for (id, group_values) in groups {
        let mut criteria = current_criteria.to_vec();
        criteria.push(GroupedCriterion {
            id,
            values: group_values,
        });
        rules.extend(parse_rules(record, config, &criteria)?);
    }
    Ok(rules)
}

/// Build a property from a data-tree value. Structs and lists that contain
/// any container become dynamic so that criteria nested below them stay
/// conditional; everything else is a terminal value.
fn parse_property(record: &str, value: &Value) -> Result<Property, ConfigError> {
    match value.kind() {
        ValueKind::Struct(config)
            if config.iter().any(|(_, field)| could_be_dynamic(field)) =>
        {
            Ok(Property::DynamicStruct(parse_rules(record, config, &[])?))
        }
        ValueKind::List(elements) if elements.iter().any(could_be_dynamic) => {
            let mut properties = Vec::with_capacity(elements.len());
            for element in elements {
                let is_sub_field = element
                    .first_annotation()
                    .and_then(CriterionDef::parse)
                    .is_some();
                if is_sub_field {
                    properties.push(parse_sub_field(record, element)?);
                } else {
                    properties.push(parse_property(record, element)?);
                }
            }
            Ok(Property::DynamicList(properties))
        }
        _ => Ok(Property::Basic(value.clone())),
    }
}

/// Parse a conditional list element: a struct with exactly one field per
/// chosen rule, named `value` (one element) or `values` (a list to splice).
fn parse_sub_field(record: &str, element: &Value) -> Result<Property, ConfigError> {
    let Some(config) = element.as_struct() else {
        return Err(ConfigError::CriterionNotAStruct {
            record: record.to_owned(),
            found: element.type_name().to_owned(),
        });
    };
    if config.len() != 1 {
        return Err(ConfigError::SubFieldShape {
            record: record.to_owned(),
            reason: format!("must contain exactly one field but has {}", config.len()),
        });
    }

    let mut rules = parse_criteria_branch(record, element, &[], None)?;
    rules.retain(|rule| !rule.values.is_empty());

    for rule in &rules {
        if rule.values.len() != 1 {
            return Err(ConfigError::SubFieldShape {
                record: record.to_owned(),
                reason: "must contain exactly one value".to_owned(),
            });
        }
        let Some((field_name, property)) = rule.values.first() else {
            continue;
        };
        match field_name {
            SUB_FIELD_VALUE => {}
            SUB_FIELD_VALUES => {
                if !property.is_list_based() {
                    return Err(ConfigError::SubFieldShape {
                        record: record.to_owned(),
                        reason: format!("the {SUB_FIELD_VALUES:?} field must be a list"),
                    });
                }
            }
            other => {
                return Err(ConfigError::SubFieldShape {
                    record: record.to_owned(),
                    reason: format!(
                        "the field must be named {SUB_FIELD_VALUE:?} or {SUB_FIELD_VALUES:?} \
                         but was {other:?}"
                    ),
                });
            }
        }
    }

    Ok(Property::DynamicSubField(rules))
}

/// True for values that can hold conditional content: non-null structs and
/// lists.
fn could_be_dynamic(value: &Value) -> bool {
    matches!(value.kind(), ValueKind::Struct(_) | ValueKind::List(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(namespace: &str, criteria: &[&str]) -> ConfigRecord {
        let priorities: Vec<Value> = criteria.iter().map(|c| Value::symbol(*c)).collect();
        ConfigRecord::new(
            "test",
            Value::from(Struct::new().field(NAMESPACE_PRIORITIES_FIELD, Value::from(priorities)))
                .with_annotations([NAMESPACE_ANNOTATION, namespace]),
        )
    }

    fn content(namespace: &str, config: Struct) -> ConfigRecord {
        ConfigRecord::new(
            "test",
            Value::from(config).with_annotations([namespace]),
        )
    }

    #[test]
    fn declaration_is_case_insensitive_on_the_marker() {
        let record = ConfigRecord::new(
            "test",
            Value::from(
                Struct::new().field(
                    NAMESPACE_PRIORITIES_FIELD,
                    Value::from(vec![Value::symbol("a")]),
                ),
            )
            .with_annotations(["NameSpace", "Example"]),
        );
        let compiled = compile([record]).unwrap();
        assert_eq!(compiled.priorities["Example"], ["a"]);
    }

    #[test]
    fn declaration_requires_two_annotations() {
        let record = ConfigRecord::new(
            "test",
            Value::from(Struct::new()).with_annotations(["namespace", "Example", "Extra"]),
        );
        assert!(matches!(
            compile([record]),
            Err(ConfigError::NamespaceShape { .. })
        ));
    }

    #[test]
    fn declaration_requires_a_text_list_of_priorities() {
        let missing = ConfigRecord::new(
            "test",
            Value::from(Struct::new()).with_annotations(["namespace", "Example"]),
        );
        assert!(matches!(
            compile([missing]),
            Err(ConfigError::NamespaceShape { .. })
        ));

        let null_list = ConfigRecord::new(
            "test",
            Value::from(Struct::new().field(NAMESPACE_PRIORITIES_FIELD, Value::null()))
                .with_annotations(["namespace", "Example"]),
        );
        assert!(matches!(
            compile([null_list]),
            Err(ConfigError::NamespaceShape { .. })
        ));

        let non_text = ConfigRecord::new(
            "test",
            Value::from(Struct::new().field(
                NAMESPACE_PRIORITIES_FIELD,
                Value::from(vec![Value::from(1_i64)]),
            ))
            .with_annotations(["namespace", "Example"]),
        );
        assert!(matches!(
            compile([non_text]),
            Err(ConfigError::NamespaceShape { .. })
        ));
    }

    #[test]
    fn duplicate_declaration_is_fatal() {
        let result = compile([declaration("Example", &["a"]), declaration("Example", &["a"])]);
        assert!(matches!(
            result,
            Err(ConfigError::DuplicateNamespace { namespace, .. }) if namespace == "Example"
        ));
    }

    #[test]
    fn record_must_be_an_annotated_struct() {
        let null_record = ConfigRecord::new("test", Value::null());
        assert!(matches!(
            compile([null_record]),
            Err(ConfigError::RecordNotAStruct { .. })
        ));

        let list_record =
            ConfigRecord::new("test", Value::from(vec![Value::from(1_i64)]));
        assert!(matches!(
            compile([list_record]),
            Err(ConfigError::RecordNotAStruct { .. })
        ));

        let unannotated = ConfigRecord::new("test", Value::from(Struct::new()));
        assert!(matches!(
            compile([unannotated]),
            Err(ConfigError::UnnamespacedRecord { .. })
        ));
    }

    #[test]
    fn data_fields_collect_per_nesting_level() {
        let config = Struct::new()
            .field("top", 1_i64)
            .field(
                "color-blue",
                Value::from(Struct::new().field("inner", 2_i64)),
            );
        let compiled = compile([declaration("Example", &["color"]), content("Example", config)])
            .unwrap();
        let rules = &compiled.namespaces["Example"];

        assert_eq!(rules.len(), 2);
        assert!(rules[0].criteria.is_empty());
        assert_eq!(
            rules[0].values.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            ["top"]
        );
        assert_eq!(rules[1].criteria.len(), 1);
        assert_eq!(rules[1].criteria[0].id.name, "color");
        assert_eq!(
            rules[1].values.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            ["inner"]
        );
    }

    #[test]
    fn empty_struct_produces_no_rules() {
        let compiled = compile([
            declaration("Example", &["color"]),
            content("Example", Struct::new()),
        ])
        .unwrap();
        assert!(compiled.namespaces["Example"].is_empty());
    }

    #[test]
    fn or_annotations_with_same_identity_group_into_one_rule() {
        let branch = Value::from(Struct::new().field("x", 1_i64))
            .with_annotations(["color-red"]);
        let config = Struct::new().field("color-blue", branch);
        let compiled =
            compile([declaration("Example", &["color"]), content("Example", config)]).unwrap();
        let rules = &compiled.namespaces["Example"];

        // The empty top-level rule plus one grouped rule.
        assert_eq!(rules.len(), 2);
        let grouped = &rules[1];
        assert_eq!(grouped.criteria.len(), 1);
        let values: Vec<&str> = grouped.criteria[0]
            .values
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(values, ["blue", "red"]);
    }

    #[test]
    fn or_annotations_with_distinct_identities_duplicate_the_rule() {
        let branch = Value::from(Struct::new().field("x", 1_i64))
            .with_annotations(["size-large"]);
        let config = Struct::new().field("color-blue", branch);
        let compiled = compile([
            declaration("Example", &["color", "size"]),
            content("Example", config),
        ])
        .unwrap();
        let rules = &compiled.namespaces["Example"];

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1].criteria[0].id.name, "color");
        assert_eq!(rules[2].criteria[0].id.name, "size");
    }

    #[test]
    fn negated_and_plain_criteria_have_distinct_identities() {
        let branch = Value::from(Struct::new().field("x", 1_i64))
            .with_annotations(["!color-blue"]);
        let config = Struct::new().field("color-blue", branch);
        let compiled =
            compile([declaration("Example", &["color"]), content("Example", config)]).unwrap();
        assert_eq!(compiled.namespaces["Example"].len(), 3);
    }

    #[test]
    fn criteria_field_must_hold_a_struct() {
        let config = Struct::new().field("color-blue", Value::null());
        let result = compile([declaration("Example", &["color"]), content("Example", config)]);
        assert!(matches!(
            result,
            Err(ConfigError::CriterionNotAStruct { found, .. }) if found == "null"
        ));
    }

    #[test]
    fn unparseable_or_annotation_is_fatal() {
        let branch =
            Value::from(Struct::new().field("x", 1_i64)).with_annotations(["no_hyphen"]);
        let config = Struct::new().field("color-blue", branch);
        let result = compile([declaration("Example", &["color"]), content("Example", config)]);
        assert!(matches!(
            result,
            Err(ConfigError::MalformedCriterion { input, .. }) if input == "no_hyphen"
        ));
    }

    #[test]
    fn plain_struct_with_container_field_compiles_dynamic() {
        let inner = Struct::new().field("sub", Value::from(vec![Value::from(1_i64)]));
        let config = Struct::new().field("outer", Value::from(inner));
        let compiled =
            compile([declaration("Example", &["color"]), content("Example", config)]).unwrap();
        let rules = &compiled.namespaces["Example"];
        match rules[0].values.first() {
            Some(("outer", Property::DynamicStruct(_))) => {}
            other => panic!("expected a dynamic struct, got {other:?}"),
        }
    }

    #[test]
    fn scalar_only_struct_stays_basic() {
        let inner = Struct::new().field("sub", 1_i64);
        let config = Struct::new().field("outer", Value::from(inner));
        let compiled =
            compile([declaration("Example", &["color"]), content("Example", config)]).unwrap();
        let rules = &compiled.namespaces["Example"];
        match rules[0].values.first() {
            Some(("outer", Property::Basic(_))) => {}
            other => panic!("expected a basic property, got {other:?}"),
        }
    }

    #[test]
    fn scalar_only_list_stays_basic() {
        let config = Struct::new().field(
            "items",
            Value::from(vec![Value::from(1_i64), Value::from(2_i64)]),
        );
        let compiled =
            compile([declaration("Example", &["color"]), content("Example", config)]).unwrap();
        match compiled.namespaces["Example"][0].values.first() {
            Some(("items", Property::Basic(_))) => {}
            other => panic!("expected a basic property, got {other:?}"),
        }
    }

    #[test]
    fn sub_field_requires_a_struct_element() {
        let element = Value::from(5_i64).with_annotations(["color-blue"]);
        let config = Struct::new().field(
            "items",
            Value::from(vec![element, Value::from(Struct::new().field("x", 1_i64))]),
        );
        let result = compile([declaration("Example", &["color"]), content("Example", config)]);
        assert!(matches!(
            result,
            Err(ConfigError::CriterionNotAStruct { .. })
        ));
    }

    #[test]
    fn sub_field_requires_exactly_one_field() {
        let element = Value::from(
            Struct::new()
                .field(SUB_FIELD_VALUE, 1_i64)
                .field("extra", 2_i64),
        )
        .with_annotations(["color-blue"]);
        let config = Struct::new().field("items", Value::from(vec![element]));
        let result = compile([declaration("Example", &["color"]), content("Example", config)]);
        assert!(matches!(result, Err(ConfigError::SubFieldShape { .. })));
    }

    #[test]
    fn sub_field_rejects_other_field_names() {
        let element = Value::from(Struct::new().field("wrong", 1_i64))
            .with_annotations(["color-blue"]);
        let config = Struct::new().field("items", Value::from(vec![element]));
        let result = compile([declaration("Example", &["color"]), content("Example", config)]);
        assert!(matches!(
            result,
            Err(ConfigError::SubFieldShape { reason, .. }) if reason.contains("wrong")
        ));
    }

    #[test]
    fn sub_field_values_must_be_a_list() {
        let element = Value::from(Struct::new().field(SUB_FIELD_VALUES, 1_i64))
            .with_annotations(["color-blue"]);
        let config = Struct::new().field("items", Value::from(vec![element]));
        let result = compile([declaration("Example", &["color"]), content("Example", config)]);
        assert!(matches!(
            result,
            Err(ConfigError::SubFieldShape { reason, .. }) if reason.contains("list")
        ));
    }

    #[test]
    fn sub_field_accepts_value_and_values() {
        let single = Value::from(Struct::new().field(SUB_FIELD_VALUE, 1_i64))
            .with_annotations(["color-blue"]);
        let spliced = Value::from(Struct::new().field(
            SUB_FIELD_VALUES,
            Value::from(vec![Value::from(2_i64)]),
        ))
        .with_annotations(["color-red"]);
        let config = Struct::new().field("items", Value::from(vec![single, spliced]));
        let compiled =
            compile([declaration("Example", &["color"]), content("Example", config)]).unwrap();
        match compiled.namespaces["Example"][0].values.first() {
            Some(("items", Property::DynamicList(elements))) => {
                assert_eq!(elements.len(), 2);
                assert!(matches!(elements[0], Property::DynamicSubField(_)));
                assert!(matches!(elements[1], Property::DynamicSubField(_)));
            }
            other => panic!("expected a dynamic list, got {other:?}"),
        }
    }

    #[test]
    fn content_records_for_one_namespace_concatenate() {
        let compiled = compile([
            declaration("Example", &["color"]),
            content("Example", Struct::new().field("a", 1_i64)),
            content("Example", Struct::new().field("b", 2_i64)),
        ])
        .unwrap();
        assert_eq!(compiled.namespaces["Example"].len(), 2);
    }
}
