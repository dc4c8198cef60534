//! The data-node promise (spec §5, "the sole coordination primitive").
//!
//! Built on `tokio::sync::OnceCell`, the runtime's native single-assignment
//! async primitive (spec §9's design note: "map suspension to your
//! target's native task/future primitive"). The first caller to resolve
//! a cell runs the producing future; every other caller — concurrent or
//! later — awaits the same memoized `Outcome`. That is exactly the
//! `lazy` semantics spec §4.5 names ("the first consumer forces the
//! thunk and memoizes the result"): eager data nodes simply have their
//! resolver awaited immediately by a background task instead of by a
//! consumer.

use std::sync::Arc;

use constellation_types::Value;
use tokio::sync::OnceCell;

use crate::error::RuntimeError;

/// The result a data node's promise resolves to. A module's own failure
/// resolves its promise `Failed`; a consumer that observes an upstream
/// `Failed` or `Cancelled` resolves its own promise `Cancelled` without
/// running (spec §5, cancellation cascade: "dependents become Cancelled,
/// not Failed").
#[derive(Debug, Clone)]
pub enum Outcome {
    Value(Value),
    Cancelled,
    Failed(Arc<RuntimeError>),
}

impl Outcome {
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, Outcome::Cancelled | Outcome::Failed(_))
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A single-assignment, many-consumer promise for one data node's value.
#[derive(Debug, Default)]
pub struct DataPromise {
    cell: OnceCell<Outcome>,
}

impl DataPromise {
    pub fn new() -> Self {
        DataPromise { cell: OnceCell::new() }
    }

    /// Resolves the promise on first call (running `produce`), or returns
    /// the already-memoized outcome on every subsequent call — including
    /// concurrent ones, which all await the same in-flight resolution.
    pub async fn get_or_resolve<F, Fut>(&self, produce: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Outcome>,
    {
        self.cell.get_or_init(produce).await.clone()
    }

    pub fn peek(&self) -> Option<Outcome> {
        self.cell.get().cloned()
    }

    /// Seeds an already-known outcome, used when resuming a suspended
    /// execution from its `computed_values` (spec §5, "resuming is
    /// starting a new run whose initial data table is pre-populated").
    /// A no-op if the cell was already resolved.
    pub fn preset(&self, outcome: Outcome) {
        let _ = self.cell.set(outcome);
    }

    /// Clears a completed promise so the pool can hand it out again for
    /// a later execution (spec §4.9).
    pub fn reset(&mut self) {
        self.cell.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn resolves_once_and_memoizes() {
        let promise = DataPromise::new();
        let calls = AtomicU32::new(0);
        let produce = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Outcome::Value(Value::Int(1))
        };

        let first = promise.get_or_resolve(produce).await;
        let second = promise.get_or_resolve(|| async { Outcome::Value(Value::Int(99)) }).await;

        assert!(matches!(first, Outcome::Value(Value::Int(1))));
        assert!(matches!(second, Outcome::Value(Value::Int(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_resolvers_only_run_the_winner() {
        let promise = Arc::new(DataPromise::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let promise = promise.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                promise
                    .get_or_resolve(|| async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Outcome::Value(Value::Bool(true))
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_clears_a_resolved_cell() {
        let mut promise = DataPromise::new();
        assert!(promise.peek().is_none());
        promise.reset();
        assert!(promise.peek().is_none());
    }
}
