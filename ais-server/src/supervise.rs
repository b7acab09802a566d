//! Worker supervision for spawned tasks.
//!
//! A supervised worker's error or panic is logged with the worker's name
//! and stops there: it never reaches sibling workers, the ingestion thread,
//! or the process.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::JoinHandle;

/// Spawn `work` as a named, supervised tokio task.
pub fn spawn<F, E>(name: impl Into<String>, work: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display,
{
    let name = name.into();
    tokio::spawn(async move {
        if let Err(reason) = run(work).await {
            tracing::error!(worker = %name, "worker {name} aborted: {reason}");
        }
    })
}

/// Run `work` to completion, folding an error or panic into a message.
pub async fn run<F, E>(work: F) -> Result<(), String>
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => Err(panic_message(panic.as_ref())),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
