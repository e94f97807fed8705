//! Test doubles shared by the unit and behaviour suites.

mod hooks;
mod listener;

use std::sync::Arc;

use crate::{Lifecycle, LifecycleOwner, Operation, Stage};

pub use hooks::ScriptedHooks;
pub use listener::{RecordingListener, TransitionLog};

/// Owner type used throughout the suites.
pub type TestOwner = LifecycleOwner<Arc<ScriptedHooks>>;

/// Builds an owner in `Stopped` alongside a handle to its hooks.
pub fn owner() -> (Arc<TestOwner>, Arc<ScriptedHooks>) {
    let hooks = Arc::new(ScriptedHooks::default());
    (Arc::new(LifecycleOwner::new(Arc::clone(&hooks))), hooks)
}

/// The owner as the trait object a container wraps.
pub fn managed(owner: &Arc<TestOwner>) -> Arc<dyn Lifecycle> {
    owner.clone()
}

/// Drives a fresh owner into `stage` through the public operations.
///
/// `Starting` and `Stopping` are reached by failing the corresponding hook.
pub fn owner_in(stage: Stage) -> (Arc<TestOwner>, Arc<ScriptedHooks>) {
    let (owner, hooks) = owner();
    match stage {
        Stage::Stopped => {}
        Stage::Initialized => {
            owner.init().expect("init should succeed");
        }
        Stage::Starting => {
            hooks.fail_on(Operation::Start);
            owner.init().expect("init should succeed");
            owner.start().expect_err("start should fail");
        }
        Stage::Running => {
            owner.init().expect("init should succeed");
            owner.start().expect("start should succeed");
        }
        Stage::Paused => {
            owner.init().expect("init should succeed");
            owner.start().expect("start should succeed");
            owner.pause().expect("pause should succeed");
        }
        Stage::Stopping => {
            hooks.fail_on(Operation::Stop);
            owner.init().expect("init should succeed");
            owner.start().expect("start should succeed");
            owner.stop().expect_err("stop should fail");
        }
    }
    assert_eq!(owner.current_stage(), stage);
    hooks.clear_calls();
    (owner, hooks)
}
