//! User and group ownership for created files and spawned commands
//!
//! Names are resolved against the system account database when they are
//! applied. Neither field is interpreted otherwise.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Owner/group pair applied to files and commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    /// Account name, `None` keeps the current user
    pub user: Option<String>,
    /// Group name, `None` keeps the current group
    pub group: Option<String>,
}

/// Numeric ids resolved from an [`Ownership`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedIds {
    /// Resolved uid
    pub uid: Option<u32>,
    /// Resolved gid
    pub gid: Option<u32>,
}

impl Ownership {
    /// Ownership for the given names
    #[must_use]
    pub fn new(user: Option<String>, group: Option<String>) -> Self {
        Self { user, group }
    }

    /// True when neither user nor group is set
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        self.user.is_none() && self.group.is_none()
    }

    /// Look up uid/gid for the configured names.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a name does not exist.
    #[cfg(unix)]
    pub fn resolve(&self) -> Result<ResolvedIds> {
        use nix::unistd::{Group, User};

        let uid = match &self.user {
            Some(name) => {
                let user = User::from_name(name)
                    .map_err(|e| Error::configuration(format!("looking up user '{name}': {e}")))?
                    .ok_or_else(|| Error::configuration(format!("unknown user '{name}'")))?;
                Some(user.uid.as_raw())
            }
            None => None,
        };

        let gid = match &self.group {
            Some(name) => {
                let group = Group::from_name(name)
                    .map_err(|e| Error::configuration(format!("looking up group '{name}': {e}")))?
                    .ok_or_else(|| Error::configuration(format!("unknown group '{name}'")))?;
                Some(group.gid.as_raw())
            }
            None => None,
        };

        Ok(ResolvedIds { uid, gid })
    }

    /// Look up uid/gid for the configured names.
    ///
    /// # Errors
    ///
    /// Ownership is not supported on this platform, so any name is an error.
    #[cfg(not(unix))]
    pub fn resolve(&self) -> Result<ResolvedIds> {
        if self.is_inherited() {
            Ok(ResolvedIds::default())
        } else {
            Err(Error::configuration(
                "user/group ownership is only supported on unix",
            ))
        }
    }

    /// Apply this ownership to an existing path. No-op when inherited.
    ///
    /// # Errors
    ///
    /// Returns an error if the names cannot be resolved or `chown` fails.
    pub fn apply(&self, path: &Path) -> Result<()> {
        if self.is_inherited() {
            return Ok(());
        }
        self.resolve()?.apply(path)
    }
}

impl ResolvedIds {
    /// Whether neither id is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uid.is_none() && self.gid.is_none()
    }

    /// `chown` an existing path to these ids. No-op when both are unset.
    ///
    /// # Errors
    ///
    /// Returns an error if `chown` fails.
    pub fn apply(self, path: &Path) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        debug!(path = %path.display(), ids = ?self, "Applying ownership");

        #[cfg(unix)]
        {
            use nix::unistd::{Gid, Uid, chown};

            chown(
                path,
                self.uid.map(Uid::from_raw),
                self.gid.map(Gid::from_raw),
            )
            .map_err(|e| {
                Error::io(
                    std::io::Error::from(e),
                    Some(path.to_path_buf()),
                    "chown",
                )
            })?;
        }

        Ok(())
    }
}

impl std::fmt::Display for Ownership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}",
            self.user.as_deref().unwrap_or("-"),
            self.group.as_deref().unwrap_or("-")
        )
    }
}
