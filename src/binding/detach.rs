//! Running binding work off the caller's await chain.
//!
//! Binding operations start at call time: whatever a surface can do without
//! suspending happens before the call returns, and the remainder moves to
//! the tokio runtime.

use std::future::Future;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt};
use tokio::runtime::Handle;

use super::result::OrUnavailable;

/// Spawn `fut` on the current tokio runtime without waiting for it.
pub(crate) fn spawn_detached<F>(label: &str, fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(fut);
        }
        Err(_) => {
            log::warn!("[Binding] No tokio runtime, dropping background work '{}'", label);
        }
    }
}

/// Poll `fut` once on the calling thread and spawn the remainder.
pub(crate) fn spawn_eager<F>(label: &str, fut: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut fut = fut.boxed();
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    if let Poll::Pending = fut.poll_unpin(&mut cx) {
        spawn_detached(label, fut);
    }
}

/// Start `fut` now and hand back a future for its result.
///
/// Without a runtime the remainder stays lazy and runs when the returned
/// future is awaited.
pub(crate) fn eager<R>(fut: BoxFuture<'static, R>) -> BoxFuture<'static, R>
where
    R: OrUnavailable + Send + 'static,
{
    let mut fut = fut;
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    match fut.poll_unpin(&mut cx) {
        Poll::Ready(out) => future::ready(out).boxed(),
        Poll::Pending => match Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = oneshot::channel();
                handle.spawn(async move {
                    let _ = tx.send(fut.await);
                });
                async move { rx.await.unwrap_or_else(|_| R::unavailable()) }.boxed()
            }
            Err(_) => fut,
        },
    }
}
