use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::{BandEdges, BandRange};

/// One of the three lighting bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Bass,
    Mid,
    Treble,
}

impl Band {
    pub const ALL: [Band; 3] = [Band::Bass, Band::Mid, Band::Treble];
}

/// Mean raw magnitude per band for a single block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl BandEnergies {
    pub fn new(bass: f32, mid: f32, treble: f32) -> Self {
        Self { bass, mid, treble }
    }

    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::Mid => self.mid,
            Band::Treble => self.treble,
        }
    }
}

/// Precomputed bin ranges of each band.
///
/// Bin frequencies increase monotonically, so the bins of a half-open
/// frequency interval always form a contiguous index range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandLayout {
    bass: Range<usize>,
    mid: Range<usize>,
    treble: Range<usize>,
}

impl BandLayout {
    pub fn new(frequencies: &[f32], edges: &BandEdges) -> Self {
        let layout = Self {
            bass: bins_within(frequencies, edges.bass),
            mid: bins_within(frequencies, edges.mid),
            treble: bins_within(frequencies, edges.treble),
        };
        for band in Band::ALL {
            if layout.bins(band).is_empty() {
                tracing::warn!(?band, "no spectrum bins fall inside band; it will read as 0");
            }
        }
        layout
    }

    pub fn bins(&self, band: Band) -> Range<usize> {
        match band {
            Band::Bass => self.bass.clone(),
            Band::Mid => self.mid.clone(),
            Band::Treble => self.treble.clone(),
        }
    }

    /// The band a bin contributes to, if any.
    pub fn band_of(&self, bin: usize) -> Option<Band> {
        Band::ALL
            .into_iter()
            .find(|band| self.bins(*band).contains(&bin))
    }

    /// Averages `raw` over each band. Empty bands read as 0.
    pub fn aggregate(&self, raw: &[f32]) -> BandEnergies {
        BandEnergies {
            bass: mean_over(raw, self.bass.clone()),
            mid: mean_over(raw, self.mid.clone()),
            treble: mean_over(raw, self.treble.clone()),
        }
    }
}

fn bins_within(frequencies: &[f32], range: BandRange) -> Range<usize> {
    let start = frequencies.partition_point(|hz| *hz < range.low_hz);
    let end = frequencies.partition_point(|hz| *hz < range.high_hz);
    start..end.max(start)
}

fn mean_over(raw: &[f32], bins: Range<usize>) -> f32 {
    match raw.get(bins) {
        Some(values) if !values.is_empty() => values.iter().sum::<f32>() / values.len() as f32,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::bin_frequencies;

    fn reference_layout() -> (Vec<f32>, BandLayout) {
        let freqs = bin_frequencies(513, 1024, 44_100);
        let layout = BandLayout::new(&freqs, &BandEdges::default());
        (freqs, layout)
    }

    #[test]
    fn reference_bins_per_band() {
        let (_, layout) = reference_layout();
        assert_eq!(layout.bins(Band::Bass), 1..6);
        assert_eq!(layout.bins(Band::Mid), 6..93);
        assert_eq!(layout.bins(Band::Treble), 93..279);
    }

    #[test]
    fn bands_partition_the_audible_range() {
        let (freqs, layout) = reference_layout();
        let edges = BandEdges::default();

        for (bin, hz) in freqs.iter().enumerate() {
            let expected = edges
                .ranges()
                .iter()
                .zip(Band::ALL)
                .filter(|(range, _)| range.contains(*hz))
                .map(|(_, band)| band)
                .collect::<Vec<_>>();
            assert!(expected.len() <= 1, "bands overlap at {hz} Hz");

            let owner = layout.band_of(bin);
            assert_eq!(owner, expected.first().copied(), "bin {bin} at {hz} Hz");
            if (20.0..12_000.0).contains(hz) {
                assert!(owner.is_some());
            } else {
                assert!(owner.is_none());
            }
        }
    }

    #[test]
    fn aggregates_means_per_band() {
        let freqs = [0.0, 100.0, 200.0, 300.0, 5_000.0, 13_000.0];
        let layout = BandLayout::new(&freqs, &BandEdges::default());
        let raw = [100.0, 2.0, 4.0, 6.0, 8.0, 100.0];
        let energies = layout.aggregate(&raw);
        assert_eq!(energies, BandEnergies::new(3.0, 6.0, 8.0));
    }

    #[test]
    fn empty_band_reads_as_zero() {
        // 8 bins at 1 kHz resolution: nothing between 20 and 250 Hz.
        let freqs = bin_frequencies(5, 8, 8_000);
        let layout = BandLayout::new(&freqs, &BandEdges::default());
        assert!(layout.bins(Band::Bass).is_empty());
        let energies = layout.aggregate(&[1.0; 5]);
        assert_eq!(energies.bass, 0.0);
        assert_eq!(energies.mid, 1.0);
    }

    #[test]
    fn silent_spectrum_aggregates_to_zero() {
        let (_, layout) = reference_layout();
        assert_eq!(layout.aggregate(&[0.0; 513]), BandEnergies::default());
    }
}
