//! Mission configuration: which players to mount and how.
//!
//! Stored as JSON. Relative paths resolve against the config file's folder.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::audio::controller::DEFAULT_LOAD_TIMEOUT;
use crate::audio::AudioSource;
use crate::graphics::Theme;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("No audio sources configured")]
    NoPlayers,

    #[error("Load timeout must be a positive number of seconds, got {0}")]
    InvalidTimeout(f64),
}

/// One player panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerConfig {
    pub title: String,
    pub source: PathBuf,
    #[serde(default)]
    pub theme: Theme,
}

impl PlayerConfig {
    /// Player for a bare audio path, titled after the file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let source = path.into();
        let title = source
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.replace(['_', '-'], " "))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Mission Audio".to_string());

        Self {
            title,
            source,
            theme: Theme::default(),
        }
    }

    pub fn audio_source(&self) -> AudioSource {
        AudioSource::new(self.source.clone(), self.title.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    pub window_title: String,
    pub players: Vec<PlayerConfig>,
    /// Briefing text shown beside the players.
    pub briefing: Option<PathBuf>,
    /// Seconds before a slow load enables playback anyway.
    pub load_timeout: f64,
    /// Where the download fallback saves assets. Defaults to the user's
    /// download folder.
    pub download_dir: Option<PathBuf>,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            window_title: "Operation DQ".to_string(),
            players: Vec::new(),
            briefing: None,
            load_timeout: 5.0,
            download_dir: None,
        }
    }
}

impl MissionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn from_paths<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            players: paths.into_iter().map(PlayerConfig::from_path).collect(),
            ..Self::default()
        }
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        for player in &mut self.players {
            if player.source.is_relative() {
                player.source = base.join(&player.source);
            }
        }
        if let Some(briefing) = self.briefing.as_mut() {
            if briefing.is_relative() {
                *briefing = base.join(&*briefing);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players.is_empty() {
            return Err(ConfigError::NoPlayers);
        }
        match Duration::try_from_secs_f64(self.load_timeout) {
            Ok(timeout) if !timeout.is_zero() => Ok(()),
            _ => Err(ConfigError::InvalidTimeout(self.load_timeout)),
        }
    }

    /// Falls back to the default when the configured value is unusable.
    pub fn load_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.load_timeout)
            .ok()
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_LOAD_TIMEOUT)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MissionConfig::default();
        assert_eq!(config.window_title, "Operation DQ");
        assert_eq!(config.load_timeout(), Duration::from_secs(5));
        assert!(matches!(config.validate(), Err(ConfigError::NoPlayers)));
    }

    #[test]
    fn test_title_from_path() {
        let player = PlayerConfig::from_path("assets/the_ascent-final.mp3");
        assert_eq!(player.title, "the ascent final");
        assert_eq!(player.theme, Theme::Steel);
        assert_eq!(player.audio_source().download_name(), "the ascent final.mp3");
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.json");
        std::fs::write(
            &path,
            r#"{
                "players": [
                    { "title": "Mission Briefing", "source": "audio/briefing.mp3" },
                    { "title": "Classified", "source": "/abs/classified.wav", "theme": "phosphor" }
                ],
                "briefing": "brief.md",
                "load_timeout": 2.5
            }"#,
        )
        .unwrap();

        let config = MissionConfig::load(&path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.players[0].source, dir.path().join("audio/briefing.mp3"));
        assert_eq!(config.players[1].source, PathBuf::from("/abs/classified.wav"));
        assert_eq!(config.players[1].theme, Theme::Phosphor);
        assert_eq!(config.briefing, Some(dir.path().join("brief.md")));
        assert_eq!(config.window_title, "Operation DQ");
        assert_eq!(config.load_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_load_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(MissionConfig::load(&missing), Err(ConfigError::Io { .. })));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ players: ").unwrap();
        assert!(matches!(MissionConfig::load(&broken), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_rejects_bad_timeout() {
        let mut config = MissionConfig::from_paths(["a.wav"]);
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e20] {
            config.load_timeout = bad;
            assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));
            assert_eq!(config.load_timeout(), DEFAULT_LOAD_TIMEOUT);
        }
    }

    #[test]
    fn test_huge_timeout_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mission.json");
        std::fs::write(
            &path,
            r#"{ "players": [{ "title": "Intel", "source": "intel.wav" }], "load_timeout": 1e20 }"#,
        )
        .unwrap();

        let config = MissionConfig::load(&path).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(t)) if t == 1e20));
        assert_eq!(config.load_timeout(), DEFAULT_LOAD_TIMEOUT);
    }
}
