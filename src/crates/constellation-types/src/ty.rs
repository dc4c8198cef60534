use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};

/// A structural type in the Constellation type algebra.
///
/// Equality is structural: two `Type`s are equal iff their shapes match
/// field-for-field, not by any nominal identity. `Product` and `Union`
/// use a `BTreeMap` so construction order never affects equality, hashing,
/// or the derived `Ord` used for canonical serialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    String,
    Int,
    Float,
    Bool,
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// Record type: unordered field map, keys unique by construction.
    Product(BTreeMap<String, Type>),
    /// Tagged sum: tags unique and non-empty by construction.
    Union(BTreeMap<String, Type>),
    Optional(Box<Type>),
}

impl Type {
    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    /// Builds a `Map` type, rejecting non-primitive key types.
    ///
    /// Resolves the spec's open question on map keys: keys must be one of
    /// the four primitive types.
    pub fn map(key: Type, value: Type) -> Result<Type> {
        if !key.is_primitive() {
            return Err(TypeError::NonPrimitiveMapKey(key));
        }
        Ok(Type::Map(Box::new(key), Box::new(value)))
    }

    pub fn product(fields: impl IntoIterator<Item = (String, Type)>) -> Result<Type> {
        let mut map = BTreeMap::new();
        for (name, ty) in fields {
            if map.insert(name.clone(), ty).is_some() {
                return Err(TypeError::DuplicateProductField(name));
            }
        }
        Ok(Type::Product(map))
    }

    pub fn union(variants: impl IntoIterator<Item = (String, Type)>) -> Result<Type> {
        let mut map = BTreeMap::new();
        for (tag, ty) in variants {
            if map.insert(tag.clone(), ty).is_some() {
                return Err(TypeError::DuplicateUnionTag(tag));
            }
        }
        if map.is_empty() {
            return Err(TypeError::EmptyUnion);
        }
        Ok(Type::Union(map))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::String | Type::Int | Type::Float | Type::Bool)
    }

    /// `self <: other` under the structural subtyping relation in spec §3.
    ///
    /// `Product`: a strict superset of fields is a subtype of the smaller.
    /// `Union`: inverted — a smaller variant set is a subtype of the larger.
    /// `Optional<T>` is only ever a subtype of another `Optional`; it is
    /// never interchangeable with `T` or its absence.
    pub fn is_subtype(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::String, Type::String)
            | (Type::Int, Type::Int)
            | (Type::Float, Type::Float)
            | (Type::Bool, Type::Bool) => true,
            (Type::List(a), Type::List(b)) => a.is_subtype(b),
            (Type::Map(ka, va), Type::Map(kb, vb)) => ka == kb && va.is_subtype(vb),
            (Type::Product(a), Type::Product(b)) => b.iter().all(|(name, bty)| {
                a.get(name)
                    .map(|aty| aty.is_subtype(bty))
                    .unwrap_or(false)
            }),
            (Type::Union(a), Type::Union(b)) => a.iter().all(|(tag, aty)| {
                b.get(tag).map(|bty| aty.is_subtype(bty)).unwrap_or(false)
            }),
            (Type::Optional(a), Type::Optional(b)) => a.is_subtype(b),
            _ => false,
        }
    }

    /// Least upper bound: the smallest type that both `self` and `other`
    /// are subtypes of, or `None` if they share no common supertype.
    ///
    /// Used by `Conditional` and `Match` to type the merged result of
    /// their branches.
    pub fn lub(&self, other: &Type) -> Option<Type> {
        match (self, other) {
            (Type::String, Type::String) => Some(Type::String),
            (Type::Int, Type::Int) => Some(Type::Int),
            (Type::Float, Type::Float) => Some(Type::Float),
            (Type::Bool, Type::Bool) => Some(Type::Bool),
            (Type::List(a), Type::List(b)) => a.lub(b).map(Type::list),
            (Type::Map(ka, va), Type::Map(kb, vb)) if ka == kb => {
                va.lub(vb).map(|v| Type::Map(ka.clone(), Box::new(v)))
            }
            (Type::Product(a), Type::Product(b)) => {
                let mut merged = BTreeMap::new();
                for (name, aty) in a {
                    if let Some(bty) = b.get(name) {
                        merged.insert(name.clone(), aty.lub(bty)?);
                    }
                }
                Some(Type::Product(merged))
            }
            (Type::Union(a), Type::Union(b)) => {
                let mut merged = BTreeMap::new();
                for (tag, aty) in a {
                    match b.get(tag) {
                        Some(bty) => merged.insert(tag.clone(), aty.lub(bty)?),
                        None => merged.insert(tag.clone(), aty.clone()),
                    };
                }
                for (tag, bty) in b {
                    merged.entry(tag.clone()).or_insert_with(|| bty.clone());
                }
                Some(Type::Union(merged))
            }
            (Type::Optional(a), Type::Optional(b)) => a.lub(b).map(Type::optional),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::String => write!(f, "String"),
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::List(t) => write!(f, "List<{}>", t),
            Type::Map(k, v) => write!(f, "Map<{},{}>", k, v),
            Type::Product(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, "}}")
            }
            Type::Union(variants) => {
                for (i, (tag, ty)) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}({})", tag, ty)?;
                }
                Ok(())
            }
            Type::Optional(t) => write!(f, "Optional<{}>", t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_subtype_only_themselves() {
        assert!(Type::Int.is_subtype(&Type::Int));
        assert!(!Type::Int.is_subtype(&Type::Float));
    }

    #[test]
    fn product_superset_is_subtype_of_smaller() {
        let wide = Type::product([
            ("id".into(), Type::String),
            ("tier".into(), Type::String),
        ])
        .unwrap();
        let narrow = Type::product([("id".into(), Type::String)]).unwrap();
        assert!(wide.is_subtype(&narrow));
        assert!(!narrow.is_subtype(&wide));
    }

    #[test]
    fn union_smaller_variant_set_is_subtype_of_larger() {
        let small = Type::union([("a".into(), Type::Int)]).unwrap();
        let large = Type::union([("a".into(), Type::Int), ("b".into(), Type::Bool)]).unwrap();
        assert!(small.is_subtype(&large));
        assert!(!large.is_subtype(&small));
    }

    #[test]
    fn optional_never_compatible_with_bare_type() {
        let opt = Type::optional(Type::Int);
        assert!(!opt.is_subtype(&Type::Int));
        assert!(!Type::Int.is_subtype(&opt));
    }

    #[test]
    fn map_rejects_non_primitive_key() {
        let err = Type::map(Type::list(Type::Int), Type::String).unwrap_err();
        assert!(matches!(err, TypeError::NonPrimitiveMapKey(_)));
    }

    #[test]
    fn lub_of_products_is_field_intersection() {
        let a = Type::product([
            ("id".into(), Type::String),
            ("tier".into(), Type::String),
        ])
        .unwrap();
        let b = Type::product([
            ("id".into(), Type::String),
            ("age".into(), Type::Int),
        ])
        .unwrap();
        let lub = a.lub(&b).unwrap();
        assert_eq!(lub, Type::product([("id".into(), Type::String)]).unwrap());
    }

    #[test]
    fn lub_of_unions_is_tag_union() {
        let a = Type::union([("a".into(), Type::Int)]).unwrap();
        let b = Type::union([("b".into(), Type::Bool)]).unwrap();
        let lub = a.lub(&b).unwrap();
        assert_eq!(
            lub,
            Type::union([("a".into(), Type::Int), ("b".into(), Type::Bool)]).unwrap()
        );
    }

    #[test]
    fn duplicate_union_tag_rejected() {
        let err = Type::union([("a".into(), Type::Int), ("a".into(), Type::Bool)]).unwrap_err();
        assert!(matches!(err, TypeError::DuplicateUnionTag(_)));
    }
}
