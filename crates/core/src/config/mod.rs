use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LightSyncError, Result};

/// Top-level configuration structure for the application.
///
/// Every value is fixed at startup. Nothing here is reloaded while the
/// real-time loop is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub transport: TransportConfig,
    pub render: RenderConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections and fields fall back
    /// to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analysis.validate(self.audio.sample_rate)?;
        self.transport.validate()?;
        self.render.validate()
    }
}

/// Configuration specific to the capture side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    pub channels: usize,
    /// Input device name. `None` selects the host default.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: 1024,
            channels: 1,
            device: None,
        }
    }
}

impl AudioConfig {
    /// Duration of one block in seconds; the processing deadline.
    pub fn block_duration_secs(&self) -> f32 {
        self.block_size as f32 / self.sample_rate as f32
    }

    /// Number of bins in the magnitude spectrum.
    pub fn bin_count(&self) -> usize {
        self.block_size / 2 + 1
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(LightSyncError::config("sample rate must be positive"));
        }
        if self.block_size < 2 {
            return Err(LightSyncError::config(format!(
                "block size must be at least 2 samples, got {}",
                self.block_size
            )));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(LightSyncError::config(format!(
                "channel count must be 1 or 2, got {}",
                self.channels
            )));
        }
        Ok(())
    }
}

/// Window applied to each mono block before the transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    Rectangular,
    Hann,
}

/// How the energy history is seeded before the first block arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupPolicy {
    /// History starts full of zeros, so the first blocks compare against a
    /// low average and fire beats readily.
    #[default]
    ZeroPadded,
    /// History starts empty and the average covers only real blocks.
    GrowFromEmpty,
}

/// Half-open frequency interval `[low_hz, high_hz)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl BandRange {
    pub const fn new(low_hz: f32, high_hz: f32) -> Self {
        Self { low_hz, high_hz }
    }

    /// Lower-inclusive, upper-exclusive membership test.
    pub fn contains(&self, hz: f32) -> bool {
        hz >= self.low_hz && hz < self.high_hz
    }
}

/// The three fixed lighting bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandEdges {
    pub bass: BandRange,
    pub mid: BandRange,
    pub treble: BandRange,
}

impl Default for BandEdges {
    fn default() -> Self {
        Self {
            bass: BandRange::new(20.0, 250.0),
            mid: BandRange::new(250.0, 4_000.0),
            treble: BandRange::new(4_000.0, 12_000.0),
        }
    }
}

impl BandEdges {
    pub fn ranges(&self) -> [BandRange; 3] {
        [self.bass, self.mid, self.treble]
    }

    fn validate(&self, sample_rate: u32) -> Result<()> {
        for range in self.ranges() {
            if !(range.low_hz >= 0.0 && range.low_hz < range.high_hz) {
                return Err(LightSyncError::config(format!(
                    "band [{}, {}) must have 0 <= low < high",
                    range.low_hz, range.high_hz
                )));
            }
        }
        if self.bass.high_hz > self.mid.low_hz || self.mid.high_hz > self.treble.low_hz {
            return Err(LightSyncError::config(
                "bands must be ordered bass < mid < treble and must not overlap",
            ));
        }
        let nyquist = sample_rate as f32 * 0.5;
        if self.treble.low_hz >= nyquist {
            return Err(LightSyncError::config(format!(
                "treble band starts at {} Hz, above the {nyquist} Hz Nyquist limit",
                self.treble.low_hz
            )));
        }
        Ok(())
    }
}

/// Tunables of the per-block analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Weight kept from the previous smoothed magnitude.
    pub smoothing: f32,
    /// Capacity of the rolling energy history, in blocks.
    pub history_len: usize,
    /// Multiple of the average energy a block must exceed to count as a beat.
    pub beat_sensitivity: f32,
    /// Band magnitude that maps to full scale on the wire.
    pub quantization_ceiling: f32,
    pub bands: BandEdges,
    pub window: WindowKind,
    pub warmup: WarmupPolicy,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.6,
            history_len: 43,
            beat_sensitivity: 1.3,
            quantization_ceiling: 2_000.0,
            bands: BandEdges::default(),
            window: WindowKind::Rectangular,
            warmup: WarmupPolicy::ZeroPadded,
        }
    }
}

impl AnalysisConfig {
    fn validate(&self, sample_rate: u32) -> Result<()> {
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(LightSyncError::config(format!(
                "smoothing must lie in [0, 1), got {}",
                self.smoothing
            )));
        }
        if self.history_len == 0 {
            return Err(LightSyncError::config("history length must be positive"));
        }
        if !(self.beat_sensitivity > 0.0) {
            return Err(LightSyncError::config("beat sensitivity must be positive"));
        }
        if !(self.quantization_ceiling > 0.0) {
            return Err(LightSyncError::config(
                "quantization ceiling must be positive",
            ));
        }
        self.bands.validate(sample_rate)
    }
}

/// Serial link to the lighting controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Serial device path. `None` runs without a controller attached.
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Frames buffered between the audio thread and the writer thread.
    pub queue_depth: usize,
    pub write_timeout_ms: u64,
    /// Pause after opening the port while the controller boots.
    pub settle_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: Some("/dev/ttyACM0".to_string()),
            baud_rate: 115_200,
            queue_depth: 8,
            write_timeout_ms: 100,
            settle_ms: 2_000,
        }
    }
}

impl TransportConfig {
    fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(LightSyncError::config("baud rate must be positive"));
        }
        if self.queue_depth == 0 {
            return Err(LightSyncError::config("transport queue depth must be positive"));
        }
        Ok(())
    }
}

/// Terminal spectrum display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    /// Number of log-spaced columns drawn between 20 Hz and 12 kHz.
    pub columns: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 30,
            columns: 48,
        }
    }
}

impl RenderConfig {
    fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(LightSyncError::config("render interval must be positive"));
        }
        if self.columns == 0 {
            return Err(LightSyncError::config("render needs at least one column"));
        }
        Ok(())
    }
}
