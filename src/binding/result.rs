//! Operation outcomes and validation stages.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// How far along the user is when a value is read.
///
/// Stages are ordered `Input < Blur < Submit`; validation failures declare a
/// threshold stage and only count when the evaluated stage reaches it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Input,
    Blur,
    Submit,
}

impl Stage {
    /// `Submit` when `submit` is set, else `Input`.
    pub fn from_submit(submit: bool) -> Self {
        if submit {
            Stage::Submit
        } else {
            Stage::Input
        }
    }

    /// Ordinal position: input 0, blur 1, submit 2.
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Input => 0,
            Stage::Blur => 1,
            Stage::Submit => 2,
        }
    }

    /// Whether a failure with `threshold` is active at this stage.
    pub fn reaches(self, threshold: Stage) -> bool {
        self.ordinal() >= threshold.ordinal()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Input => write!(f, "input"),
            Stage::Blur => write!(f, "blur"),
            Stage::Submit => write!(f, "submit"),
        }
    }
}

// ---------------------------------------------------------------------------
// GetResult
// ---------------------------------------------------------------------------

/// Outcome of reading a binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GetResult<T> {
    /// The surface produced a value that passed validation.
    Success { value: T },
    /// A value exists but failed validation for the requested stage.
    ValidationFault,
    /// No surface is attached.
    Unavailable,
}

impl<T> GetResult<T> {
    pub fn success(value: T) -> Self {
        GetResult::Success { value }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GetResult::Success { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, GetResult::Unavailable)
    }

    /// Borrow the value of a success.
    pub fn value(&self) -> Option<&T> {
        match self {
            GetResult::Success { value } => Some(value),
            _ => None,
        }
    }

    /// Take the value of a success.
    pub fn into_value(self) -> Option<T> {
        match self {
            GetResult::Success { value } => Some(value),
            _ => None,
        }
    }

    /// Map a success value, passing the other outcomes through.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GetResult<U> {
        match self {
            GetResult::Success { value } => GetResult::Success { value: f(value) },
            GetResult::ValidationFault => GetResult::ValidationFault,
            GetResult::Unavailable => GetResult::Unavailable,
        }
    }
}

// ---------------------------------------------------------------------------
// SetResult
// ---------------------------------------------------------------------------

/// Outcome of writing a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SetResult {
    Success,
    Unavailable,
}

impl SetResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SetResult::Success)
    }

    /// `Unavailable` if any result is unavailable, else `Success`.
    pub fn all(results: impl IntoIterator<Item = SetResult>) -> SetResult {
        if results.into_iter().any(|r| r == SetResult::Unavailable) {
            SetResult::Unavailable
        } else {
            SetResult::Success
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback for abandoned rendezvous slots
// ---------------------------------------------------------------------------

/// Outcome reported when a queued operation can no longer be served.
pub(crate) trait OrUnavailable {
    fn unavailable() -> Self;
}

impl<T> OrUnavailable for GetResult<T> {
    fn unavailable() -> Self {
        GetResult::Unavailable
    }
}

impl OrUnavailable for SetResult {
    fn unavailable() -> Self {
        SetResult::Unavailable
    }
}
