// SPDX-License-Identifier: MPL-2.0

//! Shared async runtime for remote reconciliation.
//!
//! UI event handlers are synchronous: they apply the optimistic change in place
//! and hand the network half of the work to this runtime.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::Runtime;

/// Network calls are I/O bound, two workers keep up with any burst of taps.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("touchline-async")
        .build()
        .expect("failed to create async runtime")
});

/// Execute a future on the shared runtime, blocking until completion.
/// Must not be called from inside an async context.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}

/// Spawn a future on the shared runtime without blocking.
pub fn spawn<F>(future: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    RUNTIME.spawn(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawned_task_completes() {
        let handle = spawn(async { 40 + 2 });
        assert_eq!(block_on(handle).unwrap(), 42);
    }
}
