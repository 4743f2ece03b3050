//! Queued work for a binding that has no surface yet.
//!
//! Operations issued while a binding is unready park on one shared
//! [`Deferred`] per operation kind. The first surface to attach replays the
//! most recent set/set_template values and resolves the slots exactly once.

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::result::{GetResult, OrUnavailable, SetResult};
use super::FieldValue;

// ---------------------------------------------------------------------------
// Deferred
// ---------------------------------------------------------------------------

/// A result slot resolved at most once and awaited by any number of callers.
pub(crate) struct Deferred<R: Clone> {
    sender: Mutex<Option<oneshot::Sender<R>>>,
    receiver: Shared<oneshot::Receiver<R>>,
}

impl<R> Deferred<R>
where
    R: Clone + OrUnavailable + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: rx.shared(),
        }
    }

    /// Resolve the slot. Returns `false` if it was already resolved.
    pub(crate) fn resolve(&self, value: R) -> bool {
        match self.sender.lock().take() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    /// Wait for the slot. A slot whose sender vanished reads as unavailable.
    pub(crate) fn wait(&self) -> BoxFuture<'static, R> {
        let rx = self.receiver.clone();
        async move { rx.await.unwrap_or_else(|_| R::unavailable()) }.boxed()
    }
}

// ---------------------------------------------------------------------------
// Rendezvous
// ---------------------------------------------------------------------------

struct Replay<T> {
    value: Option<T>,
    template: Option<(T, bool)>,
    hydrating: bool,
}

/// The unready payload of a binding.
pub(crate) struct Rendezvous<T: FieldValue> {
    pub(crate) get: Deferred<GetResult<T>>,
    pub(crate) set: Deferred<SetResult>,
    pub(crate) set_template: Deferred<SetResult>,
    replay: Mutex<Replay<T>>,
}

impl<T: FieldValue> Rendezvous<T> {
    pub(crate) fn new() -> Self {
        Self {
            get: Deferred::new(),
            set: Deferred::new(),
            set_template: Deferred::new(),
            replay: Mutex::new(Replay {
                value: None,
                template: None,
                hydrating: false,
            }),
        }
    }

    /// Last write wins.
    pub(crate) fn record_set(&self, value: T) {
        self.replay.lock().value = Some(value);
    }

    /// Last write wins, flag included.
    pub(crate) fn record_template(&self, value: T, execute_set: bool) {
        self.replay.lock().template = Some((value, execute_set));
    }

    pub(crate) fn take_value(&self) -> Option<T> {
        self.replay.lock().value.take()
    }

    pub(crate) fn take_template(&self) -> Option<(T, bool)> {
        self.replay.lock().template.take()
    }

    /// Take the hydration lock. Returns `false` if it is already held.
    pub(crate) fn begin_hydration(&self) -> bool {
        let mut replay = self.replay.lock();
        if replay.hydrating {
            return false;
        }
        replay.hydrating = true;
        true
    }

    pub(crate) fn is_hydrating(&self) -> bool {
        self.replay.lock().hydrating
    }

    /// Resolve every slot still open to unavailable.
    pub(crate) fn abandon(&self) {
        self.get.resolve(GetResult::Unavailable);
        self.set.resolve(SetResult::Unavailable);
        self.set_template.resolve(SetResult::Unavailable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deferred_shared_by_all_waiters() {
        let slot: Deferred<SetResult> = Deferred::new();
        let a = slot.wait();
        let b = slot.wait();
        assert!(slot.resolve(SetResult::Success));
        assert!(!slot.resolve(SetResult::Unavailable));
        assert_eq!(a.await, SetResult::Success);
        assert_eq!(b.await, SetResult::Success);
        assert_eq!(slot.wait().await, SetResult::Success);
    }

    #[tokio::test]
    async fn test_deferred_dropped_sender_reads_unavailable() {
        let slot: Deferred<GetResult<u8>> = Deferred::new();
        let waiter = slot.wait();
        drop(slot);
        assert_eq!(waiter.await, GetResult::Unavailable);
    }

    #[test]
    fn test_replay_last_write_wins() {
        let rv: Rendezvous<String> = Rendezvous::new();
        rv.record_set("a".into());
        rv.record_set("b".into());
        rv.record_template("t1".into(), true);
        rv.record_template("t2".into(), false);
        assert_eq!(rv.take_value(), Some("b".to_string()));
        assert_eq!(rv.take_value(), None);
        assert_eq!(rv.take_template(), Some(("t2".to_string(), false)));
    }

    #[test]
    fn test_hydration_lock() {
        let rv: Rendezvous<u8> = Rendezvous::new();
        assert!(!rv.is_hydrating());
        assert!(rv.begin_hydration());
        assert!(!rv.begin_hydration());
        assert!(rv.is_hydrating());
    }

    #[tokio::test]
    async fn test_abandon_resolves_open_slots() {
        let rv: Rendezvous<u8> = Rendezvous::new();
        rv.set.resolve(SetResult::Success);
        rv.abandon();
        assert_eq!(rv.get.wait().await, GetResult::Unavailable);
        assert_eq!(rv.set.wait().await, SetResult::Success);
        assert_eq!(rv.set_template.wait().await, SetResult::Unavailable);
    }
}
