//! Deployment profiles and the bundler exclusion list derived from them

use serde::Serialize;
use std::fmt;

/// A named deployment environment that gates optional dependency groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Local development
    Development,
    /// Production deployment
    Production,
    /// Test suite runs
    Test,
}

impl Profile {
    /// Every known profile, in declaration order
    pub const ALL: [Self; 3] = [Self::Development, Self::Production, Self::Test];

    /// The profile's group name as bundler knows it
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Profiles to exclude when `active` is the running environment.
///
/// The comparison is an exact string match against the known names. An
/// unrecognised active name is not an error: it simply matches nothing and
/// every profile stays excluded.
#[must_use]
pub fn excluded_profiles(active: &str) -> Vec<Profile> {
    Profile::ALL
        .into_iter()
        .filter(|profile| profile.name() != active)
        .collect()
}

/// Space-joined profile names, as passed to `--without`
#[must_use]
pub fn join_profiles(profiles: &[Profile]) -> String {
    profiles
        .iter()
        .map(|p| p.name())
        .collect::<Vec<_>>()
        .join(" ")
}
