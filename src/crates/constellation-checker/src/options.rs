use constellation_ast::{OptionValue, OptionsBag, Span};

use crate::error::CompileError;

const KNOWN_KEYS: &[&str] = &[
    "retry",
    "delay",
    "backoff",
    "timeout",
    "fallback",
    "throttle",
    "concurrency",
    "cache",
    "cache_backend",
    "lazy",
    "priority",
];

/// Validates a module call's options bag against the recognized keys and
/// their expected value shapes (spec §3). Per the resolved open question
/// in §9, an unrecognized key is always a compile error, never a warning.
pub fn validate_options(options: &OptionsBag) -> Result<(), Vec<CompileError>> {
    let mut errors = Vec::new();
    for (key, value, span) in &options.entries {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            errors.push(CompileError::UnknownOption {
                key: key.clone(),
                span: span.clone(),
            });
            continue;
        }
        if let Err(e) = validate_value_shape(key, value, span) {
            errors.push(e);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_value_shape(key: &str, value: &OptionValue, span: &Span) -> Result<(), CompileError> {
    let ok = match key {
        "retry" | "concurrency" => matches!(value, OptionValue::Int(n) if *n >= 0),
        "delay" | "timeout" | "cache" => matches!(value, OptionValue::Duration(_)),
        "backoff" => matches!(value, OptionValue::Ident(id) if matches!(id.as_str(), "fixed" | "linear" | "exponential")),
        "fallback" => matches!(value, OptionValue::Literal(_)),
        "throttle" => matches!(value, OptionValue::Throttle { .. }),
        "cache_backend" => matches!(value, OptionValue::Ident(_)),
        "lazy" => matches!(value, OptionValue::Bool(_)),
        "priority" => matches!(value, OptionValue::Int(_) | OptionValue::Ident(_)),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(CompileError::InvalidOptionValue {
            key: key.to_string(),
            span: span.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn span() -> Span {
        Span::synthetic()
    }

    #[test]
    fn unknown_key_is_rejected() {
        let bag = OptionsBag {
            entries: vec![("bogus".into(), OptionValue::Bool(true), span())],
        };
        let err = validate_options(&bag).unwrap_err();
        assert!(matches!(err[0], CompileError::UnknownOption { .. }));
    }

    #[test]
    fn retry_must_be_non_negative_int() {
        let bag = OptionsBag {
            entries: vec![("retry".into(), OptionValue::Int(-1), span())],
        };
        let err = validate_options(&bag).unwrap_err();
        assert!(matches!(err[0], CompileError::InvalidOptionValue { .. }));
    }

    #[test]
    fn valid_options_pass() {
        let bag = OptionsBag {
            entries: vec![
                ("retry".into(), OptionValue::Int(3), span()),
                ("delay".into(), OptionValue::Duration(Duration::from_millis(1)), span()),
                ("backoff".into(), OptionValue::Ident("fixed".into()), span()),
            ],
        };
        assert!(validate_options(&bag).is_ok());
    }
}
