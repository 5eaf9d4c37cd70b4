
use std::collections::BTreeSet;

use cascade_config::{ConfigRecord, CriteriaPredicate, PredicateMap, Struct, Value};
use proptest::prelude::*;
use strategies::{CRITERIA, arb_config, arb_predicates, compile_records};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // Evaluating the same engine with the same predicates must always
    // produce the same map.
    #[test]
    fn idempotence(config in arb_config(true), predicates in arb_predicates()) {
        let engine = config.compile();
        let first = engine.values_for_predicates("Gen", &predicates);
        for _ in 0..3 {
            let again = engine.values_for_predicates("Gen", &predicates);
            prop_assert_eq!(&first, &again);
        }
    }

    // With every (non-negated) criterion satisfied, every rule matches, so
    // the result keys are exactly the union of data fields in the tree.
    #[test]
    fn all_true_predicates_yield_the_key_union(config in arb_config(false)) {
        let engine = config.compile();
        let mut predicates = PredicateMap::new();
        for name in CRITERIA {
            predicates.insert((*name).to_owned(), CriteriaPredicate::new(|_| true));
        }
        let values = engine.values_for_predicates("Gen", &predicates);
        let keys: BTreeSet<String> = values.keys().cloned().collect();
        prop_assert_eq!(keys, config.data_field_names());
    }

    // Flipping every criterion's negation flag and inverting every
    // predicate (missing ones count as always-false) changes nothing.
    #[test]
    fn negation_involution(config in arb_config(true), predicates in arb_predicates()) {
        let original = config.compile().values_for_predicates("Gen", &predicates);

        let inverted: PredicateMap = CRITERIA
            .iter()
            .map(|name| {
                let inner = predicates
                    .get(*name)
                    .cloned()
                    .unwrap_or_else(CriteriaPredicate::always_false);
                (
                    (*name).to_owned(),
                    CriteriaPredicate::new(move |values| !inner.test(values)),
                )
            })
            .collect();
        let flipped = config.compile_flipped().values_for_predicates("Gen", &inverted);

        prop_assert_eq!(original, flipped);
    }

    // Adding records for another namespace never changes this namespace's
    // results.
    #[test]
    fn namespace_isolation(config in arb_config(true), predicates in arb_predicates()) {
        let fixed = ConfigRecord::new(
            "fixed",
            Value::from(
                Struct::new().field("x", 1_i64).field(
                    "c0-a",
                    Value::from(Struct::new().field("x", 2_i64)),
                ),
            )
            .with_annotations(["Gen"]),
        );

        let alone = compile_records(vec![fixed.clone()]);
        let mut other_declaration = vec![fixed];
        other_declaration.push(ConfigRecord::new(
            "fixed",
            Value::from(Struct::new().field(
                "prioritizedCriteria",
                Value::from(CRITERIA.iter().map(|c| Value::symbol(*c)).collect::<Vec<_>>()),
            ))
            .with_annotations(["namespace", "Other"]),
        ));
        other_declaration.push({
            let ConfigRecord { value, .. } = config.content_record(false);
            ConfigRecord::new("generated", value.with_annotations(["Other"]))
        });
        let alongside = compile_records(other_declaration);

        let expected = alone.values_for_predicates("Gen", &predicates);
        let actual = alongside.values_for_predicates("Gen", &predicates);
        prop_assert_eq!(expected, actual);
    }

    // A rule whose criteria are a superset of another matching rule's (in
    // the same vector) overrides it for every shared field.
    #[test]
    fn monotone_specificity(value in 0_i64..100, deeper in 0_i64..100) {
        let content = Struct::new()
            .field(
                "c0-a",
                Value::from(Struct::new().field("shared", value).field(
                    "c1-a",
                    Value::from(Struct::new().field("shared", deeper)),
                )),
            );
        let engine = compile_records(vec![ConfigRecord::new(
            "generated",
            Value::from(content).with_annotations(["Gen"]),
        )]);

        let mut predicates = PredicateMap::new();
        predicates.insert("c0".to_owned(), CriteriaPredicate::from_value("a"));
        predicates.insert("c1".to_owned(), CriteriaPredicate::from_value("a"));
        let values = engine.values_for_predicates("Gen", &predicates);
        prop_assert_eq!(values.get("shared"), Some(&Value::from(deeper)));
    }
}
