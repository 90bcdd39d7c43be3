//! Per-block feature extraction: spectrum, energy, beat and band levels.

mod bands;
mod energy;
mod spectrum;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use bands::{Band, BandEnergies, BandLayout};
pub use energy::{compute_rms, BeatDetector, EnergyHistory};
pub use spectrum::{bin_frequencies, SpectralAnalyzer};

use crate::{config::AnalysisConfig, Result};

/// Features extracted from a single block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFrame {
    /// RMS level of the mono block.
    pub energy: f32,
    pub beat: bool,
    pub bands: BandEnergies,
}

/// Owns every piece of state that persists between blocks: the smoothed
/// spectrum and the energy history. The band layout is fixed at
/// construction.
pub struct AnalysisEngine {
    spectral: SpectralAnalyzer,
    history: EnergyHistory,
    detector: BeatDetector,
    layout: BandLayout,
    processed_blocks: u64,
}

impl AnalysisEngine {
    pub fn new(block_size: usize, sample_rate: u32, config: &AnalysisConfig) -> Self {
        let spectral =
            SpectralAnalyzer::new(block_size, sample_rate, config.smoothing, config.window);
        let layout = BandLayout::new(spectral.frequencies(), &config.bands);
        Self {
            spectral,
            history: EnergyHistory::new(config.history_len, config.warmup),
            detector: BeatDetector::new(config.beat_sensitivity),
            layout,
            processed_blocks: 0,
        }
    }

    /// Runs one mono block through the spectrum, energy, beat and band stages.
    /// A block of the wrong length fails with
    /// [`LightSyncError::MalformedBlock`](crate::LightSyncError::MalformedBlock)
    /// and leaves the engine as it was.
    pub fn process_mono(&mut self, mono: &[f32]) -> Result<AnalysisFrame> {
        let raw = self.spectral.analyze(mono)?;
        let bands = self.layout.aggregate(raw);

        let energy = compute_rms(mono);
        self.history.push(energy);
        let beat = self.detector.detect(energy, &self.history);

        self.processed_blocks += 1;

        Ok(AnalysisFrame {
            energy,
            beat,
            bands,
        })
    }

    pub fn spectral(&self) -> &SpectralAnalyzer {
        &self.spectral
    }

    pub fn history(&self) -> &EnergyHistory {
        &self.history
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    pub fn processed_blocks(&self) -> u64 {
        self.processed_blocks
    }
}

impl fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("spectral", &self.spectral)
            .field("history", &self.history.len())
            .field("sensitivity", &self.detector.sensitivity())
            .field("layout", &self.layout)
            .field("processed_blocks", &self.processed_blocks)
            .finish()
    }
}
