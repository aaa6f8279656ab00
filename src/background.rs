//! Fire-and-forget background work.
//!
//! A handler that needs to send an email or warm a cache should not make the
//! client wait, and should not bring the process down if that side job
//! panics. [`spawn`] and [`spawn_blocking`] run the job on tokio and convert a
//! panic into an `error!` event with a backtrace. The caller gets nothing
//! back: no handle, no result, no panic.

use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::error;

use crate::middleware::recover::panic_message;

/// Runs `task` on the tokio runtime, detached from the caller.
///
/// Must be called from within a runtime, which is always the case inside a
/// handler.
pub fn spawn<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
            log_panic(&*panic);
        }
    });
}

/// Runs blocking `task` on tokio's blocking pool, detached from the caller.
pub fn spawn_blocking<F>(task: F)
where
    F: FnOnce() + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(task)) {
            log_panic(&*panic);
        }
    });
}

fn log_panic(panic: &(dyn std::any::Any + Send)) {
    let backtrace = Backtrace::force_capture();
    error!(
        panic = panic_message(panic),
        backtrace = %backtrace,
        "recovered panic in background task"
    );
}
