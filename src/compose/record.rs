//! Record types an object composition can split into per-key fields.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::binding::FieldValue;

/// A keyed value whose fields can be bound one by one.
pub trait Record: FieldValue {
    /// The type of each field.
    type Field: FieldValue;

    /// The field stored under `key`, if present.
    fn field(&self, key: &str) -> Option<Self::Field>;

    /// Assemble a record from `(key, field)` pairs.
    fn from_fields(fields: Vec<(String, Self::Field)>) -> Self;
}

/// JSON objects. Nested objects compose further since fields are `Value`s.
impl Record for Value {
    type Field = Value;

    fn field(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(key)).cloned()
    }

    fn from_fields(fields: Vec<(String, Value)>) -> Self {
        Value::Object(fields.into_iter().collect::<Map<String, Value>>())
    }
}

impl<V: FieldValue> Record for BTreeMap<String, V> {
    type Field = V;

    fn field(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }

    fn from_fields(fields: Vec<(String, V)>) -> Self {
        fields.into_iter().collect()
    }
}

impl<V: FieldValue> Record for HashMap<String, V> {
    type Field = V;

    fn field(&self, key: &str) -> Option<V> {
        self.get(key).cloned()
    }

    fn from_fields(fields: Vec<(String, V)>) -> Self {
        fields.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_fields() {
        let record = json!({"name": "Ada", "address": {"city": "London"}});
        assert_eq!(record.field("name"), Some(json!("Ada")));
        assert_eq!(record.field("missing"), None);
        assert_eq!(
            record.field("address").and_then(|a| a.field("city")),
            Some(json!("London"))
        );
        assert_eq!(json!("scalar").field("name"), None);
    }

    #[test]
    fn test_json_from_fields() {
        let value = Value::from_fields(vec![("b".into(), json!(2)), ("a".into(), json!(1))]);
        assert_eq!(value, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_map_records() {
        let map: BTreeMap<String, f64> = BTreeMap::from_fields(vec![("year".into(), 1990.0)]);
        assert_eq!(map.field("year"), Some(1990.0));
        let hashed: HashMap<String, i32> = HashMap::from_fields(vec![("a".into(), 1)]);
        assert_eq!(hashed.field("a"), Some(1));
        assert_eq!(hashed.field("b"), None);
    }
}
