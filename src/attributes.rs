//! Attribute access for candidate objects
//!
//! Validation never needs to know what a candidate object *is*; it only reads
//! named attributes. Anything that can answer "what is the value of `name`"
//! can be validated against a schema.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Read access to named attributes
pub trait Attributes {
    /// The value of `name`, or `None` when the attribute is absent
    fn attribute(&self, name: &str) -> Option<&Value>;
}

/// Write access to named attributes
pub trait AttributesMut: Attributes {
    fn set_attribute(&mut self, name: &str, value: Value);
}

impl Attributes for Map<String, Value> {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl AttributesMut for Map<String, Value> {
    fn set_attribute(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

/// A JSON value exposes attributes only when it is an object
impl Attributes for Value {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(name))
    }
}

impl AttributesMut for Value {
    fn set_attribute(&mut self, name: &str, value: Value) {
        if !self.is_object() {
            *self = Value::Object(Map::new());
        }
        if let Value::Object(map) = self {
            map.insert(name.to_string(), value);
        }
    }
}

impl Attributes for HashMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl AttributesMut for HashMap<String, Value> {
    fn set_attribute(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

impl Attributes for BTreeMap<String, Value> {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl AttributesMut for BTreeMap<String, Value> {
    fn set_attribute(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

impl<T: Attributes + ?Sized> Attributes for &T {
    fn attribute(&self, name: &str) -> Option<&Value> {
        (**self).attribute(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_attributes() {
        let obj = json!({"name": "Ada", "age": 36});
        assert_eq!(obj.attribute("name"), Some(&json!("Ada")));
        assert_eq!(obj.attribute("missing"), None);

        let not_an_object = json!([1, 2, 3]);
        assert_eq!(not_an_object.attribute("name"), None);
    }

    #[test]
    fn test_set_attribute_on_non_object_replaces_it() {
        let mut v = Value::Null;
        v.set_attribute("name", json!("Ada"));
        assert_eq!(v, json!({"name": "Ada"}));
    }
}
