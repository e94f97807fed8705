//! Coarse classification of the environment an application runs in.

use strum::{Display, EnumString};

/// Mode derived from an environment's name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RuntimeMode {
    /// A production deployment.
    Production,
    /// A runtime used for testing.
    Test,
    /// A developer's workstation.
    Development,
    /// Any name that is not one of the above.
    Unknown,
}

impl RuntimeMode {
    /// Resolves a mode from an environment name, case-insensitively.
    ///
    /// Names that do not match a known mode resolve to
    /// [`RuntimeMode::Unknown`].
    #[must_use]
    pub fn from_environment_name(name: &str) -> Self {
        name.trim().parse().unwrap_or(Self::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::RuntimeMode;

    #[rstest]
    #[case("production", RuntimeMode::Production)]
    #[case("PRODUCTION", RuntimeMode::Production)]
    #[case("Test", RuntimeMode::Test)]
    #[case("development", RuntimeMode::Development)]
    #[case(" development ", RuntimeMode::Development)]
    #[case("staging", RuntimeMode::Unknown)]
    #[case("", RuntimeMode::Unknown)]
    fn resolves_mode_from_name(#[case] name: &str, #[case] expected: RuntimeMode) {
        assert_eq!(RuntimeMode::from_environment_name(name), expected);
    }

    #[rstest]
    fn displays_in_snake_case() {
        assert_eq!(RuntimeMode::Development.to_string(), "development");
    }
}
