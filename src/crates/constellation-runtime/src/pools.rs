//! Promise and execution-state pools (spec §4.9). Grounded on
//! `langgraph-core/src/cache.rs`'s hit/miss/eviction accounting, applied
//! here to reusable `DataPromise`/`ExecutionState` containers instead of
//! cached checkpoint values. Both pools are strict acquire-use-release:
//! callers take an item out, use it for one execution, and hand it back.

use std::sync::Mutex;

use crate::promise::DataPromise;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolMetrics {
    pub hits: u64,
    pub misses: u64,
    pub acquires: u64,
}

impl PoolMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.acquires == 0 {
            0.0
        } else {
            self.hits as f64 / self.acquires as f64
        }
    }
}

struct PoolState<T> {
    spare: Vec<T>,
    hits: u64,
    misses: u64,
    acquires: u64,
}

impl<T> PoolState<T> {
    fn metrics(&self) -> PoolMetrics {
        PoolMetrics { hits: self.hits, misses: self.misses, acquires: self.acquires }
    }
}

/// A capped pool of reusable `DataPromise`s. Overflowing releases are
/// discarded rather than grown without bound (spec §4.9, "capped size,
/// discard on overflow").
pub struct PromisePool {
    state: Mutex<PoolState<DataPromise>>,
    capacity: usize,
}

impl PromisePool {
    pub fn new(capacity: usize) -> Self {
        PromisePool { state: Mutex::new(PoolState { spare: Vec::new(), hits: 0, misses: 0, acquires: 0 }), capacity }
    }

    pub fn acquire(&self) -> DataPromise {
        let mut state = self.state.lock().unwrap();
        state.acquires += 1;
        match state.spare.pop() {
            Some(promise) => {
                state.hits += 1;
                promise
            }
            None => {
                state.misses += 1;
                DataPromise::new()
            }
        }
    }

    pub fn release(&self, mut promise: DataPromise) {
        promise.reset();
        let mut state = self.state.lock().unwrap();
        if state.spare.len() < self.capacity {
            state.spare.push(promise);
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.state.lock().unwrap().metrics()
    }
}

/// Execution status of one module node, persisted in a suspended
/// execution record and reported by pool/execution introspection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ModuleStatus {
    Pending,
    Running,
    Succeeded,
    Failed(String),
    Cancelled,
}

/// A reusable container for one execution's bookkeeping: which module
/// produced which status. The DAG and computed values themselves are not
/// pooled (they vary per execution); only the container shape is reused.
#[derive(Debug, Default)]
pub struct ExecutionState {
    pub module_statuses: std::collections::HashMap<constellation_compiler::ModuleId, ModuleStatus>,
}

impl ExecutionState {
    pub fn clear(&mut self) {
        self.module_statuses.clear();
    }
}

pub struct StatePool {
    state: Mutex<PoolState<ExecutionState>>,
    capacity: usize,
}

impl StatePool {
    pub fn new(capacity: usize) -> Self {
        StatePool { state: Mutex::new(PoolState { spare: Vec::new(), hits: 0, misses: 0, acquires: 0 }), capacity }
    }

    pub fn acquire(&self) -> ExecutionState {
        let mut state = self.state.lock().unwrap();
        state.acquires += 1;
        match state.spare.pop() {
            Some(execution_state) => {
                state.hits += 1;
                execution_state
            }
            None => {
                state.misses += 1;
                ExecutionState::default()
            }
        }
    }

    pub fn release(&self, mut execution_state: ExecutionState) {
        execution_state.clear();
        let mut state = self.state.lock().unwrap();
        if state.spare.len() < self.capacity {
            state.spare.push(execution_state);
        }
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.state.lock().unwrap().metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reused_promise_counts_as_a_hit() {
        let pool = PromisePool::new(4);
        let promise = pool.acquire();
        pool.release(promise);
        let _ = pool.acquire();
        let metrics = pool.metrics();
        assert_eq!(metrics.acquires, 2);
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
    }

    #[test]
    fn overflowing_release_is_discarded() {
        let pool = PromisePool::new(1);
        pool.release(DataPromise::new());
        pool.release(DataPromise::new());
        let _first = pool.acquire();
        let metrics_after_first = pool.metrics();
        assert_eq!(metrics_after_first.hits, 1);
        // second acquire is a miss: only one spare was ever kept
        let _second = pool.acquire();
        assert_eq!(pool.metrics().misses, 1);
    }

    #[test]
    fn state_pool_clears_statuses_on_release() {
        let pool = StatePool::new(2);
        let mut state = pool.acquire();
        state.module_statuses.insert(constellation_compiler::ModuleId(0), ModuleStatus::Succeeded);
        pool.release(state);
        let reused = pool.acquire();
        assert!(reused.module_statuses.is_empty());
    }
}
