//! Spawning and timers for the single-threaded executor of each target.
//!
//! In the browser this is the microtask queue (`wasm-bindgen-futures`) and
//! `setTimeout` (`gloo-timers`). Natively it is a tokio `LocalSet`, so
//! callers must be running inside one.

use std::future::Future;
use std::time::Duration;

/// Spawns a `!Send` future onto the current thread's executor.
pub fn spawn_local<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(future);

    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = tokio::task::spawn_local(future);
    }
}

/// Completes after `duration` has elapsed.
pub async fn sleep(duration: Duration) {
    #[cfg(target_arch = "wasm32")]
    gloo_timers::future::sleep(duration).await;

    #[cfg(not(target_arch = "wasm32"))]
    tokio::time::sleep(duration).await;
}
