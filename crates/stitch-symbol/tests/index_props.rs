//! Property tests for the class index

use proptest::prelude::*;
use std::collections::BTreeSet;
use stitch_symbol::ClassIndex;
use stitch_test_utils::class;

fn class_names() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-c]\\.[A-C][a-z]{0,3}", 1..20)
}

proptest! {
    #[test]
    fn every_class_is_reachable(names in class_names()) {
        let classes: Vec<_> = names.iter().map(|n| class(n).build()).collect();
        let index = ClassIndex::build(&classes).unwrap();

        prop_assert_eq!(index.len(), names.len());
        for class in &classes {
            prop_assert!(index.contains(&class.name));
            prop_assert!(index.by_simple_name(class.name.simple_name()).contains(&class.name));
        }
    }

    #[test]
    fn iteration_order_is_independent_of_insertion(names in class_names()) {
        let forward: Vec<_> = names.iter().map(|n| class(n).build()).collect();
        let reverse: Vec<_> = forward.iter().rev().cloned().collect();
        let a = ClassIndex::build(&forward).unwrap();
        let b = ClassIndex::build(&reverse).unwrap();

        let a_names: Vec<_> = a.iter().map(|e| e.name.clone()).collect();
        let b_names: Vec<_> = b.iter().map(|e| e.name.clone()).collect();
        prop_assert_eq!(a_names, b_names);
    }
}
