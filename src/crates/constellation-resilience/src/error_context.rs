//! Error-context helpers (spec §10.3). Grounded on
//! `tooling::error::context::ErrorContext`.

use std::error::Error as StdError;
use std::fmt;

pub trait ErrorContext<T> {
    fn context(self, msg: impl Into<String>) -> Result<T, Box<dyn StdError + Send + Sync>>;

    fn with_context<F>(self, f: F) -> Result<T, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn context(self, msg: impl Into<String>) -> Result<T, Box<dyn StdError + Send + Sync>> {
        self.map_err(|e| Box::new(ContextError { message: msg.into(), source: Box::new(e) }) as Box<dyn StdError + Send + Sync>)
    }

    fn with_context<F>(self, f: F) -> Result<T, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| Box::new(ContextError { message: f(), source: Box::new(e) }) as Box<dyn StdError + Send + Sync>)
    }
}

#[derive(Debug)]
struct ContextError {
    message: String,
    source: Box<dyn StdError + Send + Sync>,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ContextError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source as &(dyn StdError + 'static))
    }
}

/// Renders an error and its full `source()` chain, one cause per line.
pub fn format_error_chain(error: &dyn StdError) -> String {
    let mut result = format!("Error: {error}");
    let mut current = error.source();
    let mut level = 1;
    while let Some(source) = current {
        result.push_str(&format!("\n{:indent$}Caused by: {source}", "", indent = level * 2));
        current = source.source();
        level += 1;
    }
    result
}

pub fn root_cause(error: &dyn StdError) -> &dyn StdError {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn inner() -> Result<(), io::Error> {
        Err(io::Error::new(io::ErrorKind::NotFound, "file not found"))
    }

    fn outer() -> Result<(), Box<dyn StdError + Send + Sync>> {
        inner().context("failed to read config file")
    }

    #[test]
    fn context_replaces_display_but_keeps_source() {
        let err = outer().unwrap_err();
        assert_eq!(err.to_string(), "failed to read config file");
        assert_eq!(err.source().unwrap().to_string(), "file not found");
    }

    #[test]
    fn format_error_chain_includes_every_cause() {
        let err = outer().unwrap_err();
        let formatted = format_error_chain(&*err);
        assert!(formatted.contains("failed to read config file"));
        assert!(formatted.contains("Caused by: file not found"));
    }

    #[test]
    fn root_cause_reaches_the_bottom_of_the_chain() {
        let err = outer().unwrap_err();
        assert_eq!(root_cause(&*err).to_string(), "file not found");
    }
}
