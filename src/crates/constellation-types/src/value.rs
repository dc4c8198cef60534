use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ty::Type;

/// A runtime value, tagged with enough structure to recover its `Type`
/// without a side table. Polymorphism over `{List, Map, Product, Union,
/// Optional}` is a tagged enum, not subtype dispatch — values carry their
/// own shape at runtime, the way the source system's dynamically typed
/// values do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List { element_type: Type, items: Vec<Value> },
    Map {
        key_type: Type,
        value_type: Type,
        entries: Vec<(Value, Value)>,
    },
    Product(BTreeMap<String, Value>),
    Union {
        tag: String,
        value: Box<Value>,
        variants: BTreeMap<String, Type>,
    },
    Some_ { value: Box<Value>, inner_type: Type },
    None_ { inner_type: Type },
}

impl Value {
    pub fn list(element_type: Type, items: Vec<Value>) -> Value {
        Value::List { element_type, items }
    }

    pub fn product(fields: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Product(fields.into_iter().collect())
    }

    pub fn some(value: Value, inner_type: Type) -> Value {
        Value::Some_ {
            value: Box::new(value),
            inner_type,
        }
    }

    pub fn none(inner_type: Type) -> Value {
        Value::None_ { inner_type }
    }

    /// Recovers the structural `Type` this value is tagged with.
    pub fn type_of(&self) -> Type {
        match self {
            Value::String(_) => Type::String,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Bool(_) => Type::Bool,
            Value::List { element_type, .. } => Type::list(element_type.clone()),
            Value::Map { key_type, value_type, .. } => {
                Type::Map(Box::new(key_type.clone()), Box::new(value_type.clone()))
            }
            Value::Product(fields) => {
                Type::Product(fields.iter().map(|(k, v)| (k.clone(), v.type_of())).collect())
            }
            Value::Union { variants, .. } => Type::Union(variants.clone()),
            Value::Some_ { inner_type, .. } | Value::None_ { inner_type } => {
                Type::optional(inner_type.clone())
            }
        }
    }

    pub fn as_product(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Product(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Value::String(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_of_product_reconstructs_field_types() {
        let v = Value::product([
            ("id".to_string(), Value::String("o1".into())),
            ("total".to_string(), Value::Float(10.0)),
        ]);
        let ty = v.type_of();
        assert_eq!(
            ty,
            Type::product([
                ("id".to_string(), Type::String),
                ("total".to_string(), Type::Float),
            ])
            .unwrap()
        );
    }

    #[test]
    fn type_of_optional_variants() {
        let some = Value::some(Value::Int(5), Type::Int);
        assert_eq!(some.type_of(), Type::optional(Type::Int));
        let none = Value::none(Type::Int);
        assert_eq!(none.type_of(), Type::optional(Type::Int));
    }
}
