//! Resolves a module call's `OptionsBag` (spec §3, "Options (per module
//! call)") into the concrete knobs the executor and resilience layer
//! need. The checker has already rejected unknown keys and type
//! mismatches by the time a `Dag` exists, so resolution here never fails
//! — every recognized key either has a value or falls back to its
//! documented default.

use std::time::Duration;

use constellation_ast::{Literal, OptionValue, OptionsBag};
use constellation_resilience::{BackoffKind, RetryPolicy};
use constellation_types::{Type, Value};

pub const DEFAULT_PRIORITY: i64 = 50;

#[derive(Debug, Clone, Default)]
pub struct ResolvedOptions {
    pub retry: Option<RetryPolicy>,
    pub timeout: Option<Duration>,
    pub fallback: Option<Value>,
    pub throttle: Option<(u64, Duration)>,
    pub concurrency: Option<usize>,
    pub cache_ttl: Option<Duration>,
    pub cache_backend: Option<String>,
    pub lazy: bool,
    pub priority: i64,
}

pub fn resolve(options: &OptionsBag) -> ResolvedOptions {
    let retries = options.get("retry").and_then(as_int).map(|n| n.max(0) as u32);
    let delay = options.get("delay").and_then(as_duration).unwrap_or(Duration::ZERO);
    let backoff = options
        .get("backoff")
        .and_then(as_ident)
        .and_then(|ident| match ident.as_str() {
            "fixed" => Some(BackoffKind::Fixed),
            "linear" => Some(BackoffKind::Linear),
            "exponential" => Some(BackoffKind::Exponential),
            _ => None,
        })
        .unwrap_or(BackoffKind::Fixed);
    let retry = retries.map(|retries| RetryPolicy::new(retries, delay, backoff));

    let fallback = options.get("fallback").and_then(|v| match v {
        OptionValue::Literal(literal) => Some(literal_to_value(literal)),
        _ => None,
    });

    let throttle = options.get("throttle").and_then(|v| match v {
        OptionValue::Throttle { rate, window } => Some((*rate, *window)),
        _ => None,
    });

    ResolvedOptions {
        retry,
        timeout: options.get("timeout").and_then(as_duration),
        fallback,
        throttle,
        concurrency: options.get("concurrency").and_then(as_int).map(|n| n.max(0) as usize),
        cache_ttl: options.get("cache").and_then(as_duration),
        cache_backend: options.get("cache_backend").and_then(as_ident),
        lazy: options.get("lazy").and_then(as_bool).unwrap_or(false),
        priority: options.get("priority").and_then(priority_value).unwrap_or(DEFAULT_PRIORITY),
    }
}

fn as_int(v: &OptionValue) -> Option<i64> {
    match v {
        OptionValue::Int(n) => Some(*n),
        _ => None,
    }
}

fn as_bool(v: &OptionValue) -> Option<bool> {
    match v {
        OptionValue::Bool(b) => Some(*b),
        _ => None,
    }
}

fn as_duration(v: &OptionValue) -> Option<Duration> {
    match v {
        OptionValue::Duration(d) => Some(*d),
        _ => None,
    }
}

fn as_ident(v: &OptionValue) -> Option<String> {
    match v {
        OptionValue::Ident(s) => Some(s.clone()),
        _ => None,
    }
}

/// `priority` accepts either a raw `0..=100` integer or one of the named
/// levels spec §4.8 lists, evenly spaced across that same range.
fn priority_value(v: &OptionValue) -> Option<i64> {
    match v {
        OptionValue::Int(n) => Some(*n),
        OptionValue::Ident(ident) => match ident.as_str() {
            "background" => Some(0),
            "low" => Some(25),
            "normal" => Some(50),
            "high" => Some(75),
            "critical" => Some(100),
            _ => None,
        },
        _ => None,
    }
}

/// Mirrors `constellation_checker::checker::literal_to_value` (private to
/// that crate): the one literal-to-value lowering the runtime itself
/// needs, for a `fallback: <literal>` option.
fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s.clone()),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::List(items) => {
            let values: Vec<Value> = items.iter().map(literal_to_value).collect();
            let elem_ty = values.first().map(|v| v.type_of()).unwrap_or_else(|| Type::product([]).unwrap());
            Value::list(elem_ty, values)
        }
        Literal::Product(fields) => {
            Value::product(fields.iter().map(|(name, value)| (name.clone(), literal_to_value(value))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_ast::OptionsBag;

    fn bag(entries: Vec<(&str, OptionValue)>) -> OptionsBag {
        OptionsBag {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v, constellation_ast::Span::synthetic()))
                .collect(),
        }
    }

    #[test]
    fn defaults_when_empty() {
        let resolved = resolve(&OptionsBag::default());
        assert!(resolved.retry.is_none());
        assert_eq!(resolved.priority, DEFAULT_PRIORITY);
        assert!(!resolved.lazy);
    }

    #[test]
    fn retry_without_backoff_defaults_to_fixed() {
        let resolved = resolve(&bag(vec![
            ("retry", OptionValue::Int(3)),
            ("delay", OptionValue::Duration(Duration::from_millis(10))),
        ]));
        let retry = resolved.retry.unwrap();
        assert_eq!(retry.attempts(), 4);
        assert_eq!(retry.backoff, BackoffKind::Fixed);
    }

    #[test]
    fn named_priority_levels_map_to_the_documented_scale() {
        assert_eq!(resolve(&bag(vec![("priority", OptionValue::Ident("critical".into()))])).priority, 100);
        assert_eq!(resolve(&bag(vec![("priority", OptionValue::Ident("background".into()))])).priority, 0);
    }

    #[test]
    fn literal_fallback_resolves_to_a_value() {
        let resolved = resolve(&bag(vec![("fallback", OptionValue::Literal(Literal::Int(7)))]));
        assert_eq!(resolved.fallback, Some(Value::Int(7)));
    }
}
