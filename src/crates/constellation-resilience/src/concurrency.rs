//! Per-module in-flight call cap (spec §4.6, "concurrency: N").

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        ConcurrencyLimiter { semaphore: Arc::new(Semaphore::new(max_concurrent)) }
    }

    /// Acquires one of the N permits, suspending the caller until one
    /// is free. The semaphore is never closed, so this cannot fail.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore.acquire().await.expect("limiter semaphore is never closed")
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
