//! Lifecycle stages and the fixed graph of legal transitions between them.
//!
//! The graph is closed: every committed transition is one of the seven edges
//! below, and the engine never writes a stage that is not a member of
//! [`Stage::ALL`].
//!
//! ```text
//! Stopped -> Initialized -> Starting -> Running -> Stopping -> Stopped
//!                                         |  ^
//!                                         v  |
//!                                        Paused
//! ```

use strum::{Display, EnumString};

/// Runtime stage of a managed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Stage {
    /// Not initialised, or fully shut down.
    Stopped,
    /// Resources prepared; ready to start.
    Initialized,
    /// The start hook is running.
    Starting,
    /// Serving.
    Running,
    /// Temporarily suspended while running.
    Paused,
    /// The stop hook is running.
    Stopping,
}

impl Stage {
    /// Every stage in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Stopped,
        Self::Initialized,
        Self::Starting,
        Self::Running,
        Self::Paused,
        Self::Stopping,
    ];

    /// Compact code stored in the atomic stage cell.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Initialized => 1,
            Self::Starting => 2,
            Self::Running => 3,
            Self::Paused => 4,
            Self::Stopping => 5,
        }
    }

    /// Inverse of [`Stage::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Stopped),
            1 => Some(Self::Initialized),
            2 => Some(Self::Starting),
            3 => Some(Self::Running),
            4 => Some(Self::Paused),
            5 => Some(Self::Stopping),
            _ => None,
        }
    }

    /// True while a start or stop hook is in flight (or stuck after failing).
    #[must_use]
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Self::Starting | Self::Stopping)
    }

    /// Whether `self -> next` is one of the declared edges.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Stopped, Self::Initialized)
                | (Self::Initialized, Self::Starting)
                | (Self::Starting, Self::Running)
                | (Self::Running, Self::Paused)
                | (Self::Paused, Self::Running)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Stopped)
        )
    }
}

/// High-level operations exposed by a lifecycle owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Operation {
    /// `Stopped -> Initialized`.
    Init,
    /// `Initialized -> Starting -> Running`.
    Start,
    /// `Running -> Paused`.
    Pause,
    /// `Paused -> Running`.
    Resume,
    /// `Running -> Stopping -> Stopped`.
    Stop,
}

impl Operation {
    /// Stage the owner must be in for the operation to proceed.
    #[must_use]
    pub const fn precondition(self) -> Stage {
        match self {
            Self::Init => Stage::Stopped,
            Self::Start => Stage::Initialized,
            Self::Pause | Self::Stop => Stage::Running,
            Self::Resume => Stage::Paused,
        }
    }

    /// Stage committed before the hook runs, for operations that have one.
    #[must_use]
    pub const fn intermediate(self) -> Option<Stage> {
        match self {
            Self::Start => Some(Stage::Starting),
            Self::Stop => Some(Stage::Stopping),
            Self::Init | Self::Pause | Self::Resume => None,
        }
    }

    /// Stage the owner ends in when the operation succeeds.
    #[must_use]
    pub const fn target(self) -> Stage {
        match self {
            Self::Init => Stage::Initialized,
            Self::Start | Self::Resume => Stage::Running,
            Self::Pause => Stage::Paused,
            Self::Stop => Stage::Stopped,
        }
    }
}
