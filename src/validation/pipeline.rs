//! Staged validator registry and the failure collector handed to validators.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;

use crate::binding::{FieldValue, GetResult, Stage};

// ---------------------------------------------------------------------------
// ValidatorId
// ---------------------------------------------------------------------------

static VALIDATOR_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Handle for unregistering a validator.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatorId(u64);

impl ValidatorId {
    fn next() -> Self {
        Self(VALIDATOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Collects failure reasons for one evaluation at one stage.
///
/// A reason is kept only when the evaluated stage reaches its threshold, so
/// a validator can report every problem it sees and let the stage decide
/// which ones are shown.
pub struct Failures<V> {
    stage: Stage,
    reasons: Arc<Mutex<Vec<V>>>,
}

impl<V> Clone for Failures<V> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            reasons: self.reasons.clone(),
        }
    }
}

impl<V> Failures<V> {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            reasons: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The stage being evaluated.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Record `reason` for the submit stage.
    pub fn fail(&self, reason: impl Into<V>) {
        self.fail_at(reason, Stage::Submit)
    }

    /// Record `reason` if the evaluated stage reaches `threshold`.
    pub fn fail_at(&self, reason: impl Into<V>, threshold: Stage) {
        if self.stage.reaches(threshold) {
            self.reasons.lock().push(reason.into());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.reasons.lock().len()
    }

    /// Drain the recorded reasons.
    pub fn take(&self) -> Vec<V> {
        std::mem::take(&mut *self.reasons.lock())
    }
}

impl<V> fmt::Debug for Failures<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failures")
            .field("stage", &self.stage)
            .field("count", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A registered validator: `true` means the value passed at that stage.
pub(crate) type ValidatorFn<T> = Arc<dyn Fn(Stage, T) -> BoxFuture<'static, bool> + Send + Sync>;

/// The validators attached to one binding.
pub(crate) struct ValidatorRegistry<T> {
    entries: Mutex<Vec<(ValidatorId, ValidatorFn<T>)>>,
}

impl<T: FieldValue> ValidatorRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn register(&self, validator: ValidatorFn<T>) -> ValidatorId {
        let id = ValidatorId::next();
        self.entries.lock().push((id, validator));
        id
    }

    pub(crate) fn unregister(&self, id: ValidatorId) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Run every validator concurrently against `value` at `stage`.
    pub(crate) async fn run(&self, stage: Stage, value: T) -> GetResult<T> {
        let validators: Vec<ValidatorFn<T>> =
            self.entries.lock().iter().map(|(_, v)| v.clone()).collect();
        if validators.is_empty() {
            return GetResult::success(value);
        }

        let passed = join_all(validators.iter().map(|v| v(stage, value.clone()))).await;
        let failed = passed.iter().filter(|ok| !**ok).count();
        if failed == 0 {
            GetResult::success(value)
        } else {
            log::trace!(
                "[Validation] {} of {} validators failed at stage '{}'",
                failed,
                passed.len(),
                stage
            );
            GetResult::ValidationFault
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    fn threshold_validator(threshold: Stage) -> ValidatorFn<i32> {
        Arc::new(move |stage: Stage, value: i32| {
            let failures: Failures<String> = Failures::new(stage);
            if value < 0 {
                failures.fail_at("negative", threshold);
            }
            async move { failures.is_empty() }.boxed()
        })
    }

    #[test]
    fn test_failures_threshold() {
        let at_input: Failures<String> = Failures::new(Stage::Input);
        at_input.fail_at("blurred", Stage::Blur);
        at_input.fail_at("always", Stage::Input);
        assert_eq!(at_input.take(), vec!["always".to_string()]);

        let at_blur: Failures<String> = Failures::new(Stage::Blur);
        at_blur.fail_at("blurred", Stage::Blur);
        at_blur.fail("submitted");
        assert_eq!(at_blur.take(), vec!["blurred".to_string()]);

        let at_submit: Failures<String> = Failures::new(Stage::Submit);
        at_submit.fail_at("blurred", Stage::Blur);
        at_submit.fail("submitted");
        assert_eq!(at_submit.len(), 2);
    }

    #[tokio::test]
    async fn test_blur_threshold_law() {
        let registry: ValidatorRegistry<i32> = ValidatorRegistry::new();
        registry.register(threshold_validator(Stage::Blur));

        assert!(registry.run(Stage::Input, -1).await.is_success());
        assert_eq!(registry.run(Stage::Blur, -1).await, GetResult::ValidationFault);
        assert_eq!(registry.run(Stage::Submit, -1).await, GetResult::ValidationFault);
        assert_eq!(registry.run(Stage::Submit, 3).await, GetResult::success(3));
    }

    #[tokio::test]
    async fn test_any_failure_faults() {
        let registry: ValidatorRegistry<i32> = ValidatorRegistry::new();
        registry.register(Arc::new(|_: Stage, _: i32| async { true }.boxed()));
        let id = registry.register(Arc::new(|_: Stage, _: i32| async { false }.boxed()));
        assert_eq!(registry.run(Stage::Input, 1).await, GetResult::ValidationFault);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.len(), 1);
        assert!(registry.run(Stage::Input, 1).await.is_success());
    }
}
