//! Gemfile.lock inspection

use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Lockfile name relative to the checkout
pub const LOCKFILE_NAME: &str = "Gemfile.lock";

/// Whether `name` occurs anywhere in the lockfile text.
///
/// This is a plain substring test, so `pg` also matches `pg_search`.
#[must_use]
pub fn contains_dependency(lockfile_content: &str, name: &str) -> bool {
    lockfile_content.contains(name)
}

/// A lockfile read once per run.
///
/// An absent or unreadable lockfile is represented as empty, and every
/// lookup against it reports "not found".
#[derive(Debug, Clone, Default)]
pub struct Lockfile {
    content: Option<String>,
}

impl Lockfile {
    /// Wrap already-read lockfile text
    #[must_use]
    pub fn from_content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// Read `directory/Gemfile.lock`. Never fails.
    pub async fn read(directory: &Path) -> Self {
        let path = directory.join(LOCKFILE_NAME);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Self {
                content: Some(String::from_utf8_lossy(&bytes).into_owned()),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No lockfile; treating every dependency as absent");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable lockfile; treating every dependency as absent");
                Self::default()
            }
        }
    }

    /// Whether a lockfile was found
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.content.is_some()
    }

    /// Whether the lockfile mentions `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.content
            .as_deref()
            .is_some_and(|content| contains_dependency(content, name))
    }
}
