use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::DEFAULT_MASTER_VOLUME;
use crate::error::{EngineError, Result};
use crate::sync::SyncOptions;
use crate::time::SEEK_TOLERANCE_SECONDS;
use crate::timeline::{TimelineId, TimelineMap};

pub const DEFAULT_TRANSITION_MS: u64 = 600;
pub const DEFAULT_PLAY_RETRY_MS: u64 = 100;
pub const DEFAULT_INTRO_FALLBACK_MS: u64 = 2_500;
pub const DEFAULT_READINESS_POLL_MS: u64 = 250;

/// Session settings, loadable from JSON. Missing fields take their defaults.
///
/// # Example
/// ```
/// use worlds_engine::{SessionConfig, TimelineId};
///
/// let config = SessionConfig::from_json_str(r#"{ "initial_timeline": "sky" }"#)
///     .expect("config should parse");
/// assert_eq!(config.initial_timeline, TimelineId::Sky);
/// assert_eq!(config.transition_ms, 600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub initial_timeline: TimelineId,
    /// Move to the next timeline when the active one ends.
    pub auto_advance: bool,
    pub start_muted: bool,
    /// Effect-sound volume in `0.0..=1.0`.
    pub master_volume: f64,
    pub transition_ms: u64,
    pub play_retry_ms: u64,
    pub seek_tolerance: f64,
    pub intro_fallback_ms: u64,
    pub readiness_poll_ms: u64,
    /// Per-timeline media URL overrides.
    pub media_sources: BTreeMap<TimelineId, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_timeline: TimelineId::Catch,
            auto_advance: false,
            start_muted: false,
            master_volume: DEFAULT_MASTER_VOLUME,
            transition_ms: DEFAULT_TRANSITION_MS,
            play_retry_ms: DEFAULT_PLAY_RETRY_MS,
            seek_tolerance: SEEK_TOLERANCE_SECONDS,
            intro_fallback_ms: DEFAULT_INTRO_FALLBACK_MS,
            readiness_poll_ms: DEFAULT_READINESS_POLL_MS,
            media_sources: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|source| EngineError::ConfigParse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| EngineError::ConfigParse {
                path: Some(path.to_path_buf()),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.seek_tolerance.is_finite() || self.seek_tolerance < 0.0 {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "seek_tolerance must be a non-negative number, got {}",
                    self.seek_tolerance
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err(EngineError::InvalidConfig {
                reason: format!(
                    "master_volume must be between 0 and 1, got {}",
                    self.master_volume
                ),
            });
        }
        if self.readiness_poll_ms == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "readiness_poll_ms must be greater than zero".to_owned(),
            });
        }
        if let Some((id, _)) = self
            .media_sources
            .iter()
            .find(|(_, source)| source.trim().is_empty())
        {
            return Err(EngineError::InvalidConfig {
                reason: format!("media source for {id} is empty"),
            });
        }
        Ok(())
    }

    /// Media URL for `id`: the override when present, else the registry URL.
    pub fn source_for(&self, id: TimelineId) -> &str {
        self.media_sources
            .get(&id)
            .map(String::as_str)
            .unwrap_or(id.timeline().media_url)
    }

    pub fn sources(&self) -> TimelineMap<String> {
        TimelineMap::from_fn(|id| self.source_for(id).to_owned())
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            play_retry_delay: Duration::from_millis(self.play_retry_ms),
            seek_tolerance: self.seek_tolerance,
        }
    }

    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn intro_fallback(&self) -> Duration {
        Duration::from_millis(self.intro_fallback_ms)
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::SessionConfig;
    use crate::error::EngineError;
    use crate::timeline::TimelineId;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SessionConfig::from_json_str("{}").expect("empty config should parse");
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.intro_fallback_ms, 2_500);
        assert_eq!(config.master_volume, 0.7);
        assert_eq!(config.sync_options().play_retry_delay.as_millis(), 100);
    }

    #[test]
    fn media_source_overrides_apply_per_timeline() {
        let config = SessionConfig::from_json_str(
            r#"{ "media_sources": { "tangled": "https://cdn.example/tangled.mp4" } }"#,
        )
        .expect("config should parse");

        assert_eq!(config.source_for(TimelineId::Tangled), "https://cdn.example/tangled.mp4");
        assert_eq!(config.source_for(TimelineId::Catch), "/videos/catch.mp4");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let error = SessionConfig::from_json_str(r#"{ "seek_tolerance": -0.5 }"#)
            .expect_err("negative tolerance must fail");
        assert!(matches!(error, EngineError::InvalidConfig { .. }));

        let error = SessionConfig::from_json_str(r#"{ "master_volume": 1.5 }"#)
            .expect_err("volume above one must fail");
        assert!(error.to_string().contains("master_volume"));

        let error = SessionConfig::from_json_str(r#"{ "initial_timeline": "moon" }"#)
            .expect_err("unknown timeline must fail");
        assert!(matches!(error, EngineError::ConfigParse { path: None, .. }));
    }

    #[test]
    fn load_reads_config_from_disk() {
        let path = std::env::temp_dir().join(format!("worlds-config-{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("create temp config");
        file.write_all(br#"{ "auto_advance": true, "transition_ms": 900 }"#)
            .expect("write temp config");

        let config = SessionConfig::load(&path).expect("config should load");
        std::fs::remove_file(&path).expect("remove temp config");

        assert!(config.auto_advance);
        assert_eq!(config.transition_ms, 900);
    }

    #[test]
    fn missing_file_reports_path() {
        let error = SessionConfig::load(std::path::Path::new("/nonexistent/worlds.json"))
            .expect_err("missing file must fail");
        assert!(error.to_string().contains("/nonexistent/worlds.json"));
    }
}
