use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::{analysis::BandEnergies, AnalysisFrame};

/// Quantized, wire-ready message for the lighting controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlFrame {
    pub bass: u8,
    pub mid: u8,
    pub treble: u8,
    pub beat: bool,
}

impl ControlFrame {
    /// Writes the frame as one `<bass>,<mid>,<treble>,<beat>\n` record.
    pub fn write_line<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{self}")
    }

    /// The wire record including its trailing newline.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.bass,
            self.mid,
            self.treble,
            u8::from(self.beat)
        )
    }
}

/// Maps band magnitudes onto the 0..=255 wire range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    ceiling: f32,
}

impl Quantizer {
    /// `ceiling` is the magnitude that maps to full scale. It depends on the
    /// input gain and is tuned empirically.
    pub fn new(ceiling: f32) -> Self {
        Self { ceiling }
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// `clamp(round(value / ceiling * 255), 0, 255)`. NaN maps to 0.
    pub fn scale(&self, value: f32) -> u8 {
        let scaled = (value / self.ceiling * 255.0).round();
        // Float-to-int `as` saturates and sends NaN to 0.
        scaled.clamp(0.0, 255.0) as u8
    }

    pub fn quantize(&self, bands: &BandEnergies, beat: bool) -> ControlFrame {
        ControlFrame {
            bass: self.scale(bands.bass),
            mid: self.scale(bands.mid),
            treble: self.scale(bands.treble),
            beat,
        }
    }

    pub fn frame(&self, analysis: &AnalysisFrame) -> ControlFrame {
        self.quantize(&analysis.bands, analysis.beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_wire_record() {
        let quantizer = Quantizer::new(2_000.0);
        let frame = quantizer.quantize(&BandEnergies::new(0.0, 1_000.0, 2_000.0), true);
        assert_eq!(
            frame,
            ControlFrame {
                bass: 0,
                mid: 128,
                treble: 255,
                beat: true
            }
        );
        assert_eq!(frame.to_line(), "0,128,255,1\n");

        let mut out = Vec::new();
        frame.write_line(&mut out).unwrap();
        assert_eq!(out, b"0,128,255,1\n");
    }

    #[test]
    fn silence_maps_to_zero_frame() {
        let quantizer = Quantizer::new(2_000.0);
        let frame = quantizer.quantize(&BandEnergies::default(), false);
        assert_eq!(frame, ControlFrame::default());
        assert_eq!(frame.to_line(), "0,0,0,0\n");
    }

    #[test]
    fn clamps_both_ends() {
        let quantizer = Quantizer::new(2_000.0);
        let overload = 2_000.0 / 255.0 * 256.0;
        assert_eq!(quantizer.scale(overload), 255);
        assert_eq!(quantizer.scale(1.0e9), 255);
        assert_eq!(quantizer.scale(f32::INFINITY), 255);
        assert_eq!(quantizer.scale(0.0), 0);
        assert_eq!(quantizer.scale(-50.0), 0);
        assert_eq!(quantizer.scale(f32::NAN), 0);
    }

    #[test]
    fn scaling_is_monotonic() {
        let quantizer = Quantizer::new(2_000.0);
        let mut previous = 0;
        for step in 0..=2_400 {
            let value = step as f32;
            let scaled = quantizer.scale(value);
            assert!(scaled >= previous, "{value} mapped below its predecessor");
            previous = scaled;
        }
        assert_eq!(previous, 255);
    }
}
