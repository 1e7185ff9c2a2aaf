use crate::posture::scorer::{ThresholdTable, Tier};
use crate::posture::{FrameSpace, ScoringConfig};
use crate::session::SessionConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_FRAME_WIDTH: u32 = 1280;
pub const DEFAULT_FRAME_HEIGHT: u32 = 720;
pub const DEFAULT_REPORT_DIR: &str = "reports";
pub const DEFAULT_VOICE_WORKERS: usize = 1;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub frame: Option<FrameSection>,
    #[serde(default)]
    pub calibration: Option<CalibrationSection>,
    #[serde(default)]
    pub scoring: Option<ScoringSection>,
    #[serde(default)]
    pub session: Option<SessionSection>,
    #[serde(default)]
    pub voice: Option<VoiceSection>,
    #[serde(default)]
    pub input: Option<InputSection>,
    #[serde(default)]
    pub report: Option<ReportSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrameSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Minimum keypoint visibility for a body to count as present
    pub min_visibility: Option<f64>,
    /// Score on normalized coordinates instead of pixels (default: false)
    pub normalized: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationSection {
    /// Frames averaged into the baseline (default: 90)
    pub frames: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringSection {
    pub smoothing_alpha: Option<f64>,
    #[serde(default)]
    pub absolute: ThresholdOverrides,
    #[serde(default)]
    pub relative: ThresholdOverrides,
}

/// Per-category tier overrides; unset categories keep the built-in table.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ThresholdOverrides {
    pub shoulder_tilt: Option<Tier>,
    pub head_roll: Option<Tier>,
    pub head_distance: Option<Tier>,
    pub hunchback: Option<Tier>,
}

impl ThresholdOverrides {
    pub fn apply(&self, base: ThresholdTable) -> ThresholdTable {
        ThresholdTable {
            shoulder_tilt: self.shoulder_tilt.unwrap_or(base.shoulder_tilt),
            head_roll: self.head_roll.unwrap_or(base.head_roll),
            head_distance: self.head_distance.unwrap_or(base.head_distance),
            hunchback: self.hunchback.unwrap_or(base.hunchback),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSection {
    pub low_score_threshold: Option<u32>,
    pub low_score_debounce_secs: Option<f64>,
    pub warning_cooldown_secs: Option<f64>,
    pub return_debounce_secs: Option<f64>,
    pub break_interval_secs: Option<f64>,
    pub break_repeat_secs: Option<f64>,
    pub notice_duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VoiceSection {
    pub enabled: Option<bool>,
    pub workers: Option<usize>,
    /// External TTS program and leading arguments; the text is appended
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputSection {
    /// JSON-lines landmark stream; stdin when unset
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSection {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    /// Returns the feature extraction space (default: 1280x720 pixels)
    pub fn frame_space(&self) -> FrameSpace {
        let frame = self.frame.as_ref();
        if frame.and_then(|f| f.normalized).unwrap_or(false) {
            return FrameSpace::Normalized;
        }
        FrameSpace::Pixels {
            width: frame.and_then(|f| f.width).unwrap_or(DEFAULT_FRAME_WIDTH) as f64,
            height: frame
                .and_then(|f| f.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT) as f64,
        }
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        let defaults = ScoringConfig::default();
        let Some(section) = &self.scoring else {
            return defaults;
        };
        ScoringConfig {
            smoothing_alpha: section.smoothing_alpha.unwrap_or(defaults.smoothing_alpha),
            absolute: section.absolute.apply(defaults.absolute),
            relative: section.relative.apply(defaults.relative),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        let defaults = SessionConfig::default();
        let session = self.session.as_ref();
        let pick = |value: Option<f64>, default: f64| value.unwrap_or(default);

        SessionConfig {
            min_visibility: pick(
                self.frame.as_ref().and_then(|f| f.min_visibility),
                defaults.min_visibility,
            ),
            calibration_frames: self
                .calibration
                .as_ref()
                .and_then(|c| c.frames)
                .unwrap_or(defaults.calibration_frames),
            low_score_threshold: session
                .and_then(|s| s.low_score_threshold)
                .unwrap_or(defaults.low_score_threshold),
            low_score_debounce_secs: pick(
                session.and_then(|s| s.low_score_debounce_secs),
                defaults.low_score_debounce_secs,
            ),
            warning_cooldown_secs: pick(
                session.and_then(|s| s.warning_cooldown_secs),
                defaults.warning_cooldown_secs,
            ),
            return_debounce_secs: pick(
                session.and_then(|s| s.return_debounce_secs),
                defaults.return_debounce_secs,
            ),
            break_interval_secs: pick(
                session.and_then(|s| s.break_interval_secs),
                defaults.break_interval_secs,
            ),
            break_repeat_secs: pick(
                session.and_then(|s| s.break_repeat_secs),
                defaults.break_repeat_secs,
            ),
            notice_duration_secs: pick(
                session.and_then(|s| s.notice_duration_secs),
                defaults.notice_duration_secs,
            ),
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice
            .as_ref()
            .and_then(|v| v.enabled)
            .unwrap_or(true)
    }

    pub fn voice_workers(&self) -> usize {
        self.voice
            .as_ref()
            .and_then(|v| v.workers)
            .unwrap_or(DEFAULT_VOICE_WORKERS)
    }

    /// Returns the TTS argv, or empty slice if announcements should only be logged.
    pub fn voice_command(&self) -> &[String] {
        self.voice
            .as_ref()
            .and_then(|v| v.command.as_deref())
            .unwrap_or(&[])
    }

    pub fn input_path(&self) -> Option<&Path> {
        let path = self.input.as_ref()?.path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report
            .as_ref()
            .and_then(|r| r.dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_DIR))
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }
}
