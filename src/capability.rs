//! Runtime capability detection.
//!
//! Queried once at startup; the result selects the
//! [`TaskRunner`](crate::runner::TaskRunner) for the whole session.

use serde::Serialize;

/// What the host can do for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Whether work can be moved off the calling thread.
    pub supports_background_worker: bool,
    /// Cores reported by the OS (at least 1).
    pub available_threads: usize,
}

/// Probe the current target. Pure: no threads are spawned.
///
/// WebAssembly without the `atomics` target feature has no threads; every
/// other target is assumed to support them. A spawn that still fails at
/// dispatch time is handled by the orchestrator's fallback.
pub fn detect() -> Capabilities {
    let supports_background_worker =
        !cfg!(all(target_family = "wasm", not(target_feature = "atomics")));
    let available_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    Capabilities {
        supports_background_worker,
        available_threads,
    }
}
