//! Property-based tests for value equality and digest stability


use proptest::prelude::*;
use settle::{Array, Object, Value};

/// Arbitrary values up to three levels of nesting
pub fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_map(Value::Number),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4)
                .prop_map(|items| Value::Array(Array::from_vec(items))),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(|entries| {
                let object = Object::new();
                for (key, item) in entries {
                    object.insert(key, item);
                }
                Value::Object(object)
            }),
        ]
    })
}
