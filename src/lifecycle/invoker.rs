//! Hook invocation funnel
//!
//! Every phase hook is run through [`invoke`]. Returned errors and panics
//! both become [`HookOutcome::Faulted`]; nothing escapes to the caller.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::HookError;

use super::hooks::HookContext;

/// Result of one guarded hook invocation.
#[derive(Debug)]
pub enum HookOutcome {
    /// The hook ran and returned `Ok`.
    Completed,
    /// No hook is installed; the step is a no-op that still advances.
    NoHook,
    /// The hook returned an error or panicked.
    Faulted(HookError),
}

impl HookOutcome {
    /// `true` unless the hook faulted.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Faulted(_))
    }

    /// Label used for the `outcome` metric dimension.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoHook => "no_hook",
            Self::Faulted(HookError::Panicked(_)) => "panicked",
            Self::Faulted(_) => "failed",
        }
    }
}

/// Runs the hook for `ctx.operation()` on `ctx.entity()`.
pub fn invoke(ctx: &HookContext<'_>) -> HookOutcome {
    let Some(hook) = ctx.entity().hooks().get(ctx.operation()) else {
        return HookOutcome::NoHook;
    };

    match guarded(|| hook(ctx)) {
        Ok(Ok(())) => HookOutcome::Completed,
        Ok(Err(err)) => HookOutcome::Faulted(err),
        Err(msg) => HookOutcome::Faulted(HookError::Panicked(msg)),
    }
}

/// Runs host code the engine calls outside a hook, such as the liveness
/// flags or a fault sink. A panic comes back as its message.
pub fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
