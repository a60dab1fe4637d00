//! Equality and snapshot policy for watchers.

use super::Value;

/// How a watcher decides whether its value changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Equality {
    /// Scalars by value, arrays and objects by handle. NaN equals NaN.
    #[default]
    Identity,
    /// Structural comparison; snapshots are deep copies.
    Deep,
}

impl Equality {
    pub fn matches(self, current: &Value, last: &Value) -> bool {
        match self {
            Equality::Identity => same_value(current, last),
            Equality::Deep => deep_equals(current, last),
        }
    }

    /// Value to retain for the next comparison.
    ///
    /// Deep mode must copy: retaining the live handle would make a later in-place
    /// mutation indistinguishable from the snapshot.
    pub fn snapshot(self, value: &Value) -> Value {
        match self {
            Equality::Identity => value.clone(),
            Equality::Deep => value.deep_copy(),
        }
    }
}

/// Identity comparison, NaN-aware.
pub fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => x.ptr_eq(y),
        (Value::Object(x), Value::Object(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Structural comparison over nested arrays and objects, NaN-aware.
///
/// Does not terminate on cyclic values.
pub fn deep_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            let (x, y) = (x.0.borrow(), y.0.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(l, r)| deep_equals(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            if x.ptr_eq(y) {
                return true;
            }
            let (x, y) = (x.0.borrow(), y.0.borrow());
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| deep_equals(l, r)))
        }
        _ => same_value(a, b),
    }
}
