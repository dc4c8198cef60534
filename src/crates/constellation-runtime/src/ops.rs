//! Pure value-level implementations of the synthetic inline transforms
//! (spec §4.4): `merge`, `project`, `field access`, `guard`, `coalesce`,
//! boolean/arithmetic/comparison `binary` ops, and string `concat`. These
//! are fixed, always-succeed-on-well-typed-input structural operations —
//! shared between the top-level DAG executor and the nested lambda/match
//! interpreter, the same way both call sites share one IR node shape.

use std::collections::BTreeMap;

use constellation_ast::BinOp;
use constellation_types::{Type, Value};

use crate::error::RuntimeError;

pub fn merge(a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (a, b) {
        (Value::Product(mut fields_a), Value::Product(fields_b)) => {
            fields_a.extend(fields_b);
            Ok(Value::Product(fields_a))
        }
        (Value::List { element_type, items }, right @ Value::Product(_)) => {
            let merged: Result<Vec<Value>, RuntimeError> =
                items.into_iter().map(|item| merge(item, right.clone())).collect();
            let merged = merged?;
            let elem_ty = merged.first().map(|v| v.type_of()).unwrap_or(element_type);
            Ok(Value::list(elem_ty, merged))
        }
        (Value::List { element_type: ty_a, items: xs }, Value::List { items: ys, .. }) => {
            if xs.len() != ys.len() {
                return Err(RuntimeError::ListLengthMismatch { a: xs.len(), b: ys.len() });
            }
            let merged: Result<Vec<Value>, RuntimeError> =
                xs.into_iter().zip(ys).map(|(x, y)| merge(x, y)).collect();
            let merged = merged?;
            let elem_ty = merged.first().map(|v| v.type_of()).unwrap_or(ty_a);
            Ok(Value::list(elem_ty, merged))
        }
        (a, b) => Err(RuntimeError::type_mismatch_values("Product or List<Product>", &a, &b)),
    }
}

pub fn project(src: Value, fields: &[String]) -> Result<Value, RuntimeError> {
    match src {
        Value::Product(map) => Ok(Value::Product(select_fields(&map, fields)?)),
        Value::List { element_type, items } => {
            let projected: Result<Vec<Value>, RuntimeError> =
                items.into_iter().map(|item| project(item, fields)).collect();
            let projected = projected?;
            let elem_ty = projected.first().map(|v| v.type_of()).unwrap_or(element_type);
            Ok(Value::list(elem_ty, projected))
        }
        other => Err(RuntimeError::type_mismatch_value("Product or List<Product>", &other)),
    }
}

fn select_fields(map: &BTreeMap<String, Value>, fields: &[String]) -> Result<BTreeMap<String, Value>, RuntimeError> {
    let mut out = BTreeMap::new();
    for field in fields {
        let value = map
            .get(field)
            .cloned()
            .ok_or_else(|| RuntimeError::RuntimeTypeError { expected: format!("field `{field}`"), actual: "missing".into() })?;
        out.insert(field.clone(), value);
    }
    Ok(out)
}

pub fn field_access(src: Value, field: &str) -> Result<Value, RuntimeError> {
    match src {
        Value::Product(map) => map.get(field).cloned().ok_or_else(|| RuntimeError::RuntimeTypeError {
            expected: format!("field `{field}`"),
            actual: "missing".into(),
        }),
        Value::List { items, .. } => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(field_access(item, field)?);
            }
            let elem_ty = out.first().map(|v| v.type_of()).unwrap_or_else(|| Type::product([]).unwrap());
            Ok(Value::list(elem_ty, out))
        }
        other => Err(RuntimeError::type_mismatch_value("Product or List<Product>", &other)),
    }
}

pub fn conditional(cond: Value, then_branch: Value, else_branch: Value) -> Result<Value, RuntimeError> {
    Ok(if require_bool(&cond)? { then_branch } else { else_branch })
}

pub fn guard(src: Value, cond: Value, inner_type: Type) -> Result<Value, RuntimeError> {
    if require_bool(&cond)? {
        Ok(Value::some(src, inner_type))
    } else {
        Ok(Value::none(inner_type))
    }
}

pub fn coalesce(a: Value, b: Value) -> Result<Value, RuntimeError> {
    match a {
        Value::Some_ { value, .. } => Ok(*value),
        Value::None_ { .. } => Ok(b),
        other => Err(RuntimeError::type_mismatch_value("Optional", &other)),
    }
}

pub fn and(a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(require_bool(&a)? && require_bool(&b)?))
}

pub fn or(a: Value, b: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(require_bool(&a)? || require_bool(&b)?))
}

pub fn not(a: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(!require_bool(&a)?))
}

fn require_bool(v: &Value) -> Result<bool, RuntimeError> {
    v.as_bool().ok_or_else(|| RuntimeError::type_mismatch_value("Bool", v))
}

pub fn binary(op: BinOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => numeric(op, a, b),
        BinOp::Eq => Ok(Value::Bool(a == b)),
        BinOp::Neq => Ok(Value::Bool(a != b)),
        BinOp::Lt | BinOp::Lte | BinOp::Gt | BinOp::Gte => compare(op, a, b),
    }
}

fn numeric(op: BinOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    match (op, a, b) {
        (BinOp::Add, Value::String(x), Value::String(y)) => Ok(Value::String(x + &y)),
        (BinOp::Add, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x + y)),
        (BinOp::Add, Value::Float(x), Value::Float(y)) => Ok(Value::Float(x + y)),
        (BinOp::Sub, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x - y)),
        (BinOp::Sub, Value::Float(x), Value::Float(y)) => Ok(Value::Float(x - y)),
        (BinOp::Mul, Value::Int(x), Value::Int(y)) => Ok(Value::Int(x * y)),
        (BinOp::Mul, Value::Float(x), Value::Float(y)) => Ok(Value::Float(x * y)),
        (BinOp::Div, Value::Int(x), Value::Int(y)) => {
            if y == 0 {
                return Err(RuntimeError::RuntimeTypeError { expected: "non-zero divisor".into(), actual: "0".into() });
            }
            Ok(Value::Int(x / y))
        }
        (BinOp::Div, Value::Float(x), Value::Float(y)) => Ok(Value::Float(x / y)),
        (op, a, b) => Err(RuntimeError::type_mismatch_values(&format!("Int or Float for {op:?}"), &a, &b)),
    }
}

fn compare(op: BinOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
    let ordering = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x.partial_cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        _ => None,
    };
    let ordering = ordering.ok_or_else(|| RuntimeError::type_mismatch_values("comparable Int or Float", &a, &b))?;
    use std::cmp::Ordering::*;
    let result = match op {
        BinOp::Lt => ordering == Less,
        BinOp::Lte => ordering != Greater,
        BinOp::Gt => ordering == Greater,
        BinOp::Gte => ordering != Less,
        _ => unreachable!("compare only called for ordering operators"),
    };
    Ok(Value::Bool(result))
}

pub fn concat(parts: Vec<Value>) -> Result<Value, RuntimeError> {
    let mut out = String::new();
    for part in parts {
        out.push_str(&stringify(&part)?);
    }
    Ok(Value::String(out))
}

fn stringify(v: &Value) -> Result<String, RuntimeError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(RuntimeError::type_mismatch_value("a primitive value", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_right_side_wins_on_conflicting_fields() {
        let a = Value::product([("id".to_string(), Value::Int(1)), ("name".to_string(), Value::String("a".into()))]);
        let b = Value::product([("name".to_string(), Value::String("b".into()))]);
        let merged = merge(a, b).unwrap();
        assert_eq!(merged.as_product().unwrap().get("name"), Some(&Value::String("b".into())));
        assert_eq!(merged.as_product().unwrap().get("id"), Some(&Value::Int(1)));
    }

    #[test]
    fn merge_lists_requires_equal_length() {
        let a = Value::list(Type::Int, vec![Value::product([("a".into(), Value::Int(1))])]);
        let b = Value::list(
            Type::Int,
            vec![
                Value::product([("b".into(), Value::Int(2))]),
                Value::product([("b".into(), Value::Int(3))]),
            ],
        );
        assert!(matches!(merge(a, b), Err(RuntimeError::ListLengthMismatch { a: 1, b: 2 })));
    }

    #[test]
    fn project_keeps_only_named_fields() {
        let v = Value::product([
            ("id".to_string(), Value::Int(1)),
            ("secret".to_string(), Value::String("x".into())),
        ]);
        let projected = project(v, &["id".to_string()]).unwrap();
        assert_eq!(projected.as_product().unwrap().len(), 1);
    }

    #[test]
    fn guard_wraps_or_empties_based_on_condition() {
        assert_eq!(guard(Value::Int(5), Value::Bool(true), Type::Int).unwrap(), Value::some(Value::Int(5), Type::Int));
        assert_eq!(guard(Value::Int(5), Value::Bool(false), Type::Int).unwrap(), Value::none(Type::Int));
    }

    #[test]
    fn coalesce_falls_back_on_none() {
        assert_eq!(coalesce(Value::none(Type::Int), Value::Int(9)).unwrap(), Value::Int(9));
        assert_eq!(coalesce(Value::some(Value::Int(1), Type::Int), Value::Int(9)).unwrap(), Value::Int(1));
    }

    #[test]
    fn binary_add_on_ints() {
        assert_eq!(binary(BinOp::Add, Value::Int(2), Value::Int(3)).unwrap(), Value::Int(5));
    }

    #[test]
    fn binary_div_by_zero_is_a_runtime_type_error() {
        assert!(binary(BinOp::Div, Value::Int(1), Value::Int(0)).is_err());
    }

    #[test]
    fn concat_stringifies_primitive_parts() {
        let result = concat(vec![Value::String("total: ".into()), Value::Int(3), Value::Bool(true)]).unwrap();
        assert_eq!(result, Value::String("total: 3true".into()));
    }
}
