//! Shared thread pool for the per-replica loops.
//!
//! Bootstrap resampling, covariance accumulation, GEVP sweeps and replica
//! fits all run inside this pool, so nested analyses share one set of
//! worker threads.

#[cfg(feature = "parallel")]
use rayon::ThreadPool;

#[cfg(feature = "parallel")]
use std::sync::OnceLock;

#[cfg(feature = "parallel")]
static THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

/// Worker stack size; replica fits of large correlator matrices recurse
/// through nalgebra decompositions on the worker stack.
#[cfg(feature = "parallel")]
const STACK_SIZE: usize = 8 * 1024 * 1024;

/// Get or initialize the shared thread pool.
///
/// The pool uses 8 MB worker stacks and one thread per logical CPU.
/// Returns `None` if the pool could not be built; callers then fall back
/// to rayon's global pool.
#[cfg(feature = "parallel")]
pub fn get_thread_pool() -> Option<&'static ThreadPool> {
    THREAD_POOL
        .get_or_init(|| {
            match rayon::ThreadPoolBuilder::new()
                .stack_size(STACK_SIZE)
                .thread_name(|i| format!("lattice-plateaus-{i}"))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    log::warn!("falling back to the global rayon pool: {err}");
                    None
                }
            }
        })
        .as_ref()
}

/// Execute a parallel operation inside the shared pool.
#[cfg(feature = "parallel")]
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R + Send,
    R: Send,
{
    match get_thread_pool() {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

/// Execute `op` directly; without the `parallel` feature there is no pool.
#[cfg(not(feature = "parallel"))]
pub fn install<OP, R>(op: OP) -> R
where
    OP: FnOnce() -> R,
{
    op()
}
