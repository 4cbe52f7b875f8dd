//! Configuration management (config.toml)
//!
//! Handles loading, saving, and providing defaults for harness settings.
//! Settings are stored in TOML format in the platform-specific config directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::input::InputConfig;

/// Harness configuration.
///
/// Every section falls back to its defaults when missing from the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Window and back buffer settings
    #[serde(default)]
    pub video: VideoConfig,
    /// Audio device and ring buffer settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Simulation memory sizes
    #[serde(default)]
    pub arena: ArenaConfig,
    /// Frame pacing
    #[serde(default)]
    pub timing: TimingConfig,
    /// Input recording and playback
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Simulation module source
    #[serde(default)]
    pub module: ModuleConfig,
    /// Keyboard and gamepad settings
    #[serde(default)]
    pub input: InputConfig,
}

/// Window and back buffer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Initial back buffer width in pixels (default: 960)
    #[serde(default = "default_width")]
    pub width: u32,
    /// Initial back buffer height in pixels (default: 540)
    #[serde(default = "default_height")]
    pub height: u32,
    /// Whether to enable vertical sync (default: true)
    #[serde(default = "default_true")]
    pub vsync: bool,
}

/// Audio configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Whether to open an audio device at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Requested output sample rate (default: 48000)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Ring buffer length in milliseconds (default: 1000)
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u32,
    /// Look-ahead past the play cursor, in game frames (default: 4)
    #[serde(default = "default_latency_frames")]
    pub latency_frames: u32,
    /// Tone volume for the built-in simulation (default: 3000)
    #[serde(default = "default_tone_volume")]
    pub tone_volume: i16,
}

/// Simulation memory configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Permanent region size in bytes (default: 1 MiB)
    #[serde(default = "default_permanent_bytes")]
    pub permanent_bytes: usize,
    /// Transient region size in bytes (default: 3 MiB)
    #[serde(default = "default_transient_bytes")]
    pub transient_bytes: usize,
}

/// Frame pacing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Target simulation update rate in Hz (default: 60)
    #[serde(default = "default_update_hz")]
    pub update_hz: u32,
}

/// Input recording and playback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Key that toggles recording (default: L)
    #[serde(default = "default_record_toggle")]
    pub record_toggle: String,
    /// Key that toggles playback (default: P)
    #[serde(default = "default_playback_toggle")]
    pub playback_toggle: String,
    /// Slot used until another one is selected (default: 1)
    #[serde(default = "default_slot")]
    pub default_slot: u8,
    /// Directory for persisted slots (default: `<data_dir>/replays`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_dir: Option<PathBuf>,
}

/// Simulation module configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModuleConfig {
    /// Path to a `.wasm` simulation module. The built-in simulation runs when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_width() -> u32 {
    960
}

fn default_height() -> u32 {
    540
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_buffer_ms() -> u32 {
    1000
}

fn default_latency_frames() -> u32 {
    4
}

fn default_tone_volume() -> i16 {
    3000
}

fn default_permanent_bytes() -> usize {
    1024 * 1024
}

fn default_transient_bytes() -> usize {
    3 * 1024 * 1024
}

fn default_update_hz() -> u32 {
    60
}

fn default_record_toggle() -> String {
    "L".to_string()
}

fn default_playback_toggle() -> String {
    "P".to_string()
}

fn default_slot() -> u8 {
    1
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            vsync: default_true(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            sample_rate: default_sample_rate(),
            buffer_ms: default_buffer_ms(),
            latency_frames: default_latency_frames(),
            tone_volume: default_tone_volume(),
        }
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            permanent_bytes: default_permanent_bytes(),
            transient_bytes: default_transient_bytes(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            update_hz: default_update_hz(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            record_toggle: default_record_toggle(),
            playback_toggle: default_playback_toggle(),
            default_slot: default_slot(),
            slot_dir: None,
        }
    }
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("arena must be at least one byte")]
    EmptyArena,
    #[error("update rate must be nonzero")]
    ZeroUpdateRate,
    #[error("sample rate must be nonzero")]
    ZeroSampleRate,
    #[error("audio look-ahead must be at least one sample frame")]
    ZeroMargin,
    #[error(
        "audio look-ahead of {margin_bytes} bytes does not fit in a {capacity_bytes}-byte ring buffer"
    )]
    MarginExceedsBuffer {
        margin_bytes: u64,
        capacity_bytes: u64,
    },
    #[error("replay slot {0} is out of range (1-{max})", max = crate::replay::SLOT_COUNT)]
    SlotOutOfRange(u8),
    #[error("unknown key name '{0}'")]
    UnknownKey(String),
}

impl AudioConfig {
    /// Ring buffer length in sample frames for the given device rate
    pub fn buffer_frames(&self, sample_rate: u32) -> u32 {
        ((sample_rate as u64 * self.buffer_ms as u64) / 1000) as u32
    }

    /// Look-ahead in sample frames for the given device rate and update rate
    pub fn margin_frames(&self, sample_rate: u32, update_hz: u32) -> u32 {
        ((sample_rate as u64 * self.latency_frames as u64) / update_hz.max(1) as u64) as u32
    }
}

impl Config {
    /// Check the values that would otherwise fail deep inside the frame loop
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena.permanent_bytes + self.arena.transient_bytes == 0 {
            return Err(ConfigError::EmptyArena);
        }
        if self.timing.update_hz == 0 {
            return Err(ConfigError::ZeroUpdateRate);
        }
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }

        let bytes_per_frame = crate::audio::BYTES_PER_SAMPLE_FRAME as u64;
        let capacity_bytes = self.audio.buffer_frames(self.audio.sample_rate) as u64 * bytes_per_frame;
        let margin_bytes = self
            .audio
            .margin_frames(self.audio.sample_rate, self.timing.update_hz) as u64
            * bytes_per_frame;
        if margin_bytes == 0 {
            return Err(ConfigError::ZeroMargin);
        }
        if margin_bytes >= capacity_bytes {
            return Err(ConfigError::MarginExceedsBuffer {
                margin_bytes,
                capacity_bytes,
            });
        }

        if !(1..=crate::replay::SLOT_COUNT as u8).contains(&self.replay.default_slot) {
            return Err(ConfigError::SlotOutOfRange(self.replay.default_slot));
        }
        for key in [&self.replay.record_toggle, &self.replay.playback_toggle] {
            if crate::input::string_to_keycode(key).is_none() {
                return Err(ConfigError::UnknownKey(key.clone()));
            }
        }
        Ok(())
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Hotloop\config`
/// On macOS: `~/Library/Application Support/io.hotloop.Hotloop`
/// On Linux: `~/.config/hotloop`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.hotloop", "", "Hotloop")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory.
///
/// Persisted replay slots live under `replays/` here unless
/// `replay.slot_dir` overrides it.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.hotloop", "", "Hotloop")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `config.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> Config {
    config_dir()
        .map(|dir| load_from(&dir.join("config.toml")))
        .unwrap_or_default()
}

/// Loads a configuration file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    match toml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring unparsable config {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Directory for persisted replay slots
pub fn slot_dir(config: &ReplayConfig) -> Option<PathBuf> {
    config
        .slot_dir
        .clone()
        .or_else(|| data_dir().map(|dir| dir.join("replays")))
}
