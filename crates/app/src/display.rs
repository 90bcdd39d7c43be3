//! Terminal spectrum display fed from the render snapshot.

use std::{
    io::{self, Write},
    ops::Range,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use lightsync_core::{RenderConfig, RenderHandle, SpectrumSnapshot};

const LOW_HZ: f32 = 20.0;
const HIGH_HZ: f32 = 12_000.0;
const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Log-frequency bar graph of the smoothed spectrum.
pub struct SpectrumDisplay {
    handle: RenderHandle,
    columns: Vec<Range<usize>>,
    ceiling: f32,
    snapshot: SpectrumSnapshot,
}

impl SpectrumDisplay {
    pub fn new(handle: RenderHandle, columns: usize, ceiling: f32) -> Self {
        let columns = log_columns(handle.frequencies(), columns);
        Self {
            handle,
            columns,
            ceiling,
            snapshot: SpectrumSnapshot::default(),
        }
    }

    /// Polls the latest snapshot and draws one line.
    pub fn render_line(&mut self) -> lightsync_core::Result<String> {
        self.handle.snapshot_into(&mut self.snapshot)?;
        Ok(self.draw())
    }

    fn draw(&self) -> String {
        let mut line = String::with_capacity(self.columns.len() * 3 + 16);
        line.push(if self.snapshot.beat { '●' } else { '○' });
        line.push(' ');
        for bins in &self.columns {
            let peak = self
                .snapshot
                .magnitudes
                .get(bins.clone())
                .map(|values| values.iter().copied().fold(0.0_f32, f32::max))
                .unwrap_or(0.0);
            let level = (peak / self.ceiling * (LEVELS.len() - 1) as f32).round();
            let index = level.clamp(0.0, (LEVELS.len() - 1) as f32) as usize;
            line.push(LEVELS[index]);
        }
        line.push_str(&format!(" {:.3}", self.snapshot.energy));
        line
    }
}

/// Splits [20 Hz, 12 kHz) into `count` log-spaced columns of bins. Columns
/// narrower than one bin borrow the nearest bin above their lower edge.
fn log_columns(frequencies: &[f32], count: usize) -> Vec<Range<usize>> {
    let ratio = (HIGH_HZ / LOW_HZ).powf(1.0 / count as f32);
    let last = frequencies.len().saturating_sub(1);
    (0..count)
        .map(|column| {
            let low = LOW_HZ * ratio.powi(column as i32);
            let high = low * ratio;
            let start = frequencies.partition_point(|hz| *hz < low).min(last);
            let end = frequencies.partition_point(|hz| *hz < high);
            start..end.max(start + 1)
        })
        .collect()
}

/// Runs the display loop on its own thread until `stop` is set. The loop only
/// reads the render snapshot.
pub fn spawn(
    handle: RenderHandle,
    config: &RenderConfig,
    ceiling: f32,
    stop: Arc<AtomicBool>,
) -> lightsync_core::Result<JoinHandle<()>> {
    let interval = Duration::from_millis(config.interval_ms);
    let mut display = SpectrumDisplay::new(handle, config.columns, ceiling);

    let worker = thread::Builder::new()
        .name("lightsync-display".to_string())
        .spawn(move || {
            let stdout = io::stdout();
            while !stop.load(Ordering::Relaxed) {
                match display.render_line() {
                    Ok(line) => {
                        let mut out = stdout.lock();
                        let _ = write!(out, "\r{line}");
                        let _ = out.flush();
                    }
                    Err(err) => {
                        tracing::warn!(%err, "display stopped");
                        break;
                    }
                }
                thread::sleep(interval);
            }
            println!();
        })?;

    Ok(worker)
}

#[cfg(test)]
mod tests {
    use lightsync_core::{AnalysisFrame, RenderPublisher};

    use super::*;

    fn reference_frequencies() -> Vec<f32> {
        (0..513).map(|bin| bin as f32 * 44_100.0 / 1024.0).collect()
    }

    #[test]
    fn columns_cover_the_display_range_in_order() {
        let freqs = reference_frequencies();
        let columns = log_columns(&freqs, 48);
        assert_eq!(columns.len(), 48);
        assert!(columns.iter().all(|bins| !bins.is_empty()));
        assert!(columns.windows(2).all(|pair| pair[0].start <= pair[1].start));
        assert!(freqs[columns[47].end - 1] < HIGH_HZ);
    }

    #[test]
    fn draws_levels_and_beat_marker() {
        let freqs = reference_frequencies();
        let publisher = RenderPublisher::new(freqs.clone().into());
        let mut display = SpectrumDisplay::new(publisher.handle(), 4, 2_000.0);

        let line = display.render_line().unwrap();
        assert!(line.starts_with('○'));
        assert_eq!(line.chars().filter(|c| *c == ' ').count(), 1 + 4 + 1);

        let magnitudes = vec![2_000.0; freqs.len()];
        let frame = AnalysisFrame {
            beat: true,
            energy: 0.25,
            ..Default::default()
        };
        publisher.publish(&magnitudes, &frame, 1);

        let line = display.render_line().unwrap();
        assert_eq!(line, "● ████ 0.250");
    }
}
