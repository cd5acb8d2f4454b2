//! Runtime version pin files: stale marker removal and the pin writer

use rackenv_core::outcome::{Step, StepOutcome, StepStatus};
use rackenv_core::ownership::Ownership;
use rackenv_core::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// The pin file rbenv reads, written with the resolved version
pub const PIN_FILE_NAME: &str = ".ruby-version";

/// Pin markers left behind by rvm, rbenv and older tooling
pub const LEGACY_PIN_FILES: [&str; 4] = [".rvmrc", "ruby-version", ".ruby-version", ".rbenv-version"];

/// Content of the current pin file, `None` when absent or unreadable.
///
/// Read before [`remove_stale_pins`] so [`write_pin`] can tell whether the
/// pin actually changed across the run.
pub async fn read_pin(directory: &Path) -> Option<String> {
    tokio::fs::read_to_string(directory.join(PIN_FILE_NAME))
        .await
        .ok()
}

/// Delete every legacy pin file present in `directory`.
///
/// Missing files are skipped. The current pin is removed as well, but it is
/// rewritten by [`write_pin`] later in the run, so only the other markers
/// count as a change and appear in the details.
///
/// # Errors
///
/// Returns an error if a present file cannot be removed.
pub async fn remove_stale_pins(directory: &Path) -> Result<StepOutcome> {
    let mut removed = Vec::new();

    for name in LEGACY_PIN_FILES {
        let path = directory.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed stale pin file");
                if name != PIN_FILE_NAME {
                    removed.push(name.to_string());
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::io(e, Some(path), "removing stale pin file"));
            }
        }
    }

    let status = if removed.is_empty() {
        StepStatus::Unchanged
    } else {
        info!(files = ?removed, "Removed stale pin files");
        StepStatus::Changed
    };

    Ok(StepOutcome::new(Step::RemoveStalePins, status).with_details(removed))
}

/// Write `version` as the entire content of the pin file, then apply
/// `ownership`.
///
/// Ownership is resolved before anything is written. The file is always
/// rewritten; the status reports whether its content differs from
/// `previous`, the pin as it was at the start of the run.
///
/// # Errors
///
/// Returns an error if the owner or group does not exist, the directory is
/// not writable, or `chown` fails.
pub async fn write_pin(
    directory: &Path,
    version: &str,
    previous: Option<&str>,
    ownership: &Ownership,
) -> Result<StepOutcome> {
    let path = directory.join(PIN_FILE_NAME);
    let ids = ownership.resolve()?;

    tokio::fs::write(&path, version)
        .await
        .map_err(|e| Error::io(e, Some(path.clone()), "writing version pin"))?;
    ids.apply(&path)?;

    let status = if previous == Some(version) {
        StepStatus::Unchanged
    } else {
        StepStatus::Changed
    };
    info!(path = %path.display(), %version, %status, "Wrote version pin");

    Ok(StepOutcome::new(Step::WritePin, status).with_details(vec![version.to_string()]))
}
