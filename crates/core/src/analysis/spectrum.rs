use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{config::WindowKind, LightSyncError, Result};

/// Block-synchronous magnitude spectrum with exponential smoothing.
///
/// All buffers are sized once from the block size. Each call to
/// [`SpectralAnalyzer::analyze`] overwrites the raw magnitudes and folds them
/// into the smoothed magnitudes, which persist for the analyzer's lifetime.
pub struct SpectralAnalyzer {
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    window: Option<Vec<f32>>,
    raw: Vec<f32>,
    smoothed: Vec<f32>,
    smoothing: f32,
    frequencies: Arc<[f32]>,
}

impl SpectralAnalyzer {
    pub fn new(block_size: usize, sample_rate: u32, smoothing: f32, window: WindowKind) -> Self {
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(block_size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        let bins = spectrum.len();

        let window = match window {
            WindowKind::Rectangular => None,
            WindowKind::Hann => Some(
                (0..block_size)
                    .map(|index| hann_value(index, block_size))
                    .collect(),
            ),
        };

        tracing::debug!(block_size, sample_rate, bins, "spectral analyzer planned");

        Self {
            plan,
            input,
            spectrum,
            scratch,
            window,
            raw: vec![0.0; bins],
            smoothed: vec![0.0; bins],
            smoothing,
            frequencies: bin_frequencies(bins, block_size, sample_rate).into(),
        }
    }

    /// Transforms one mono block and updates the smoothed state. Returns this
    /// block's raw magnitudes. A block of the wrong length is rejected
    /// before any state changes.
    pub fn analyze(&mut self, mono: &[f32]) -> Result<&[f32]> {
        if mono.len() != self.input.len() {
            return Err(LightSyncError::MalformedBlock {
                expected: self.input.len(),
                actual: mono.len(),
            });
        }

        match &self.window {
            Some(window) => {
                for ((slot, sample), weight) in self.input.iter_mut().zip(mono).zip(window) {
                    *slot = sample * weight;
                }
            }
            None => self.input.copy_from_slice(mono),
        }

        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)?;

        let keep = self.smoothing;
        let blend = 1.0 - keep;
        for ((raw, smoothed), bin) in self
            .raw
            .iter_mut()
            .zip(self.smoothed.iter_mut())
            .zip(&self.spectrum)
        {
            *raw = bin.norm();
            *smoothed = keep * *smoothed + blend * *raw;
        }

        Ok(&self.raw)
    }

    /// Raw magnitudes from the most recent block.
    pub fn raw(&self) -> &[f32] {
        &self.raw
    }

    pub fn smoothed(&self) -> &[f32] {
        &self.smoothed
    }

    /// Centre frequency of every bin, `i * sample_rate / block_size`.
    pub fn frequencies(&self) -> &Arc<[f32]> {
        &self.frequencies
    }

    pub fn bin_count(&self) -> usize {
        self.raw.len()
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.raw.fill(0.0);
        self.smoothed.fill(0.0);
    }
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("block_size", &self.input.len())
            .field("bins", &self.raw.len())
            .field("smoothing", &self.smoothing)
            .field("windowed", &self.window.is_some())
            .finish()
    }
}

/// Frequency of each of the `bins` outputs of a real FFT over `block_size`
/// samples.
pub fn bin_frequencies(bins: usize, block_size: usize, sample_rate: u32) -> Vec<f32> {
    let resolution = sample_rate as f32 / block_size as f32;
    (0..bins).map(|bin| bin as f32 * resolution).collect()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
