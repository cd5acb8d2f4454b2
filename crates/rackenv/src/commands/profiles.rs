use crate::errors::CliError;
use rackenv_core::profile::{excluded_profiles, join_profiles};

/// Render the exclusion list for `profile`: space-separated names, or a JSON
/// array when `json` is set.
pub fn render(profile: &str, json: bool) -> Result<String, CliError> {
    if profile.trim().is_empty() {
        return Err(CliError::invalid_argument("profile must not be empty"));
    }

    let excluded = excluded_profiles(profile);
    if json {
        serde_json::to_string(&excluded).map_err(CliError::output)
    } else {
        Ok(join_profiles(&excluded))
    }
}
