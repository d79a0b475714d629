// factory-detect/src/preset.rs
use crate::ConfigError;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Load one named profile from a JSON preset file.
///
/// Preset files map profile names to settings:
/// `{ "default": { ... }, "bright": { ... } }`.
pub fn load_profile<T: DeserializeOwned>(path: &Path, profile: &str) -> Result<T, ConfigError> {
    let shown = path.display().to_string();
    if !path.exists() {
        return Err(ConfigError::Missing(shown));
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: shown.clone(),
        source,
    })?;
    let mut profiles: BTreeMap<String, T> =
        serde_json::from_str(&text).map_err(|source| ConfigError::Malformed {
            path: shown.clone(),
            source,
        })?;
    profiles
        .remove(profile)
        .ok_or_else(|| ConfigError::UnknownProfile {
            path: shown,
            profile: profile.to_string(),
        })
}
