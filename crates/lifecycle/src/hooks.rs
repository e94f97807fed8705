//! Capability set supplied by a managed component.

use std::sync::Arc;

use crate::error::HookError;

/// Work a managed component performs as it moves through its stages.
///
/// Hooks take `&self` because the container may run `do_start` and `do_stop`
/// on worker threads; components keep mutable resources behind their own
/// synchronisation.
pub trait LifecycleHooks: Send + Sync {
    /// Prepares resources. Runs before the owner commits `Initialized`.
    fn do_init(&self) -> Result<(), HookError>;

    /// Starts serving. Runs while the owner is `Starting`.
    fn do_start(&self) -> Result<(), HookError>;

    /// Suspends work. Runs before the owner commits `Paused`.
    fn do_pause(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Resumes work. Runs before the owner commits `Running` again.
    fn do_resume(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Releases resources. Runs while the owner is `Stopping`.
    fn do_stop(&self) -> Result<(), HookError>;
}

impl<T> LifecycleHooks for Arc<T>
where
    T: LifecycleHooks + ?Sized,
{
    fn do_init(&self) -> Result<(), HookError> {
        (**self).do_init()
    }

    fn do_start(&self) -> Result<(), HookError> {
        (**self).do_start()
    }

    fn do_pause(&self) -> Result<(), HookError> {
        (**self).do_pause()
    }

    fn do_resume(&self) -> Result<(), HookError> {
        (**self).do_resume()
    }

    fn do_stop(&self) -> Result<(), HookError> {
        (**self).do_stop()
    }
}
