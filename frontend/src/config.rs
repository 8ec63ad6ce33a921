//! Persisted front-panel settings (CPU speed, audio, zoom, asset path),
//! loaded from a TOML file under the platform config directory and
//! overridden per-run by CLI flags. Mirrors how a desktop frontend remembers
//! window/volume preferences across launches without the user needing to
//! repeat `-k`/`-v`/`-z` every time.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use beastem::BeastError;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub khz: u32,
    pub sample_rate: u32,
    pub volume: u8,
    pub zoom: f32,
    pub asset_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            khz: 8000,
            sample_rate: 22_050,
            volume: beastem::system::DEFAULT_VOLUME,
            zoom: 1.0,
            asset_path: None,
        }
    }
}

fn config_path() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("beastem").join("settings.toml"))
}

/// Load saved settings, falling back to defaults if no file exists or it
/// fails to parse. A malformed settings file is logged and ignored rather
/// than treated as a startup error.
pub fn load() -> Settings {
    let Some(path) = config_path() else {
        return Settings::default();
    };
    match fs::read_to_string(&path) {
        Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
            log::warn!("ignoring malformed settings file {}: {e}", path.display());
            Settings::default()
        }),
        Err(_) => Settings::default(),
    }
}

/// Persist `settings`, creating the config directory if necessary.
pub fn save(settings: &Settings) -> Result<(), BeastError> {
    let Some(path) = config_path() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let text = toml::to_string_pretty(settings).map_err(|e| BeastError::Cli(format!("failed to serialize settings: {e}")))?;
    fs::write(&path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let settings = Settings { khz: 4000, sample_rate: 44_100, volume: 7, zoom: 2.0, asset_path: Some("/roms".into()) };
        let text = toml::to_string_pretty(&settings).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.khz, 4000);
        assert_eq!(back.asset_path.as_deref(), Some("/roms"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let back: Settings = toml::from_str("khz = 6000\n").unwrap();
        assert_eq!(back.khz, 6000);
        assert_eq!(back.volume, Settings::default().volume);
    }
}
