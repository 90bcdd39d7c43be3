//! WAV file source: runs recorded audio through the same block pipeline the
//! live capture uses.

use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use hound::{SampleFormat, WavReader};
use lightsync_core::{
    AnalysisFrame, AudioConfig, BlockAssembler, ControlFrame, FrameSender, LightSyncError,
    Pipeline, Result,
};
use serde::Serialize;

/// Samples handed to the assembler per read.
const READ_CHUNK: usize = 4096;

pub struct WavSource {
    path: PathBuf,
    reader: WavReader<BufReader<File>>,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = WavReader::open(&path).map_err(|err| wav_error(&path, err))?;
        let spec = reader.spec();
        tracing::debug!(
            ?path,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            bits = spec.bits_per_sample,
            "opened wav source"
        );
        Ok(Self { path, reader })
    }

    /// Copies the file's sample rate and channel count into `audio`.
    pub fn apply_format(&self, audio: &mut AudioConfig) {
        let spec = self.reader.spec();
        audio.sample_rate = spec.sample_rate;
        audio.channels = usize::from(spec.channels);
    }

    /// Streams interleaved samples normalised to [-1, 1] to `on_chunk`,
    /// at most [`READ_CHUNK`] at a time.
    fn for_each_chunk<F>(self, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        let Self { path, reader } = self;
        let spec = reader.spec();
        let mut chunk = Vec::with_capacity(READ_CHUNK);
        match spec.sample_format {
            SampleFormat::Float => {
                let samples = reader
                    .into_samples::<f32>()
                    .map(|sample| sample.map_err(|err| wav_error(&path, err)));
                feed_chunks(samples, &mut chunk, &mut on_chunk)
            }
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                let samples = reader.into_samples::<i32>().map(|sample| {
                    sample
                        .map(|value| value as f32 * scale)
                        .map_err(|err| wav_error(&path, err))
                });
                feed_chunks(samples, &mut chunk, &mut on_chunk)
            }
        }
    }
}

fn feed_chunks<I, F>(samples: I, chunk: &mut Vec<f32>, on_chunk: &mut F) -> Result<()>
where
    I: Iterator<Item = Result<f32>>,
    F: FnMut(&[f32]) -> Result<()>,
{
    for sample in samples {
        chunk.push(sample?);
        if chunk.len() == READ_CHUNK {
            on_chunk(chunk)?;
            chunk.clear();
        }
    }
    if !chunk.is_empty() {
        on_chunk(chunk)?;
        chunk.clear();
    }
    Ok(())
}

fn wav_error(path: &Path, err: hound::Error) -> LightSyncError {
    match err {
        hound::Error::IoError(io) => LightSyncError::Io(io),
        other => LightSyncError::msg(format!("{}: {other}", path.display())),
    }
}

/// One JSON line of analysis output.
#[derive(Debug, Serialize)]
struct BlockRecord<'a> {
    block: u64,
    time: f32,
    #[serde(flatten)]
    analysis: &'a AnalysisFrame,
    frame: &'a ControlFrame,
    line: String,
}

/// Totals reported once the file is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OfflineSummary {
    pub blocks: u64,
    pub beats: u64,
    /// Trailing samples that did not fill a whole block.
    pub discarded_samples: usize,
}

/// Feeds the whole file through `pipeline`, writing a JSON record per block
/// to `out` and handing each frame to `sender`. With `realtime` set, blocks
/// are paced at the file's own rate.
pub fn analyze<W: Write>(
    source: WavSource,
    pipeline: &mut Pipeline,
    out: &mut W,
    sender: Option<&FrameSender>,
    realtime: bool,
) -> Result<OfflineSummary> {
    let layout = pipeline.layout();
    let block_period =
        Duration::from_secs_f64(layout.block_size as f64 / f64::from(pipeline.sample_rate()));
    let mut assembler = BlockAssembler::new(layout);
    let mut summary = OfflineSummary::default();
    let mut failure: Option<LightSyncError> = None;

    source.for_each_chunk(|chunk| {
        assembler.push(chunk, |block| {
            if failure.is_some() {
                return;
            }
            let output = match pipeline.process_block(block) {
                Ok(output) => output,
                Err(err) => {
                    failure = Some(err);
                    return;
                }
            };

            if let Some(sender) = sender {
                sender.send(output.frame);
            }

            let record = BlockRecord {
                block: summary.blocks,
                time: summary.blocks as f32 * block_period.as_secs_f32(),
                analysis: &output.analysis,
                frame: &output.frame,
                line: output.frame.to_string(),
            };
            if let Err(err) = write_record(&mut *out, &record) {
                failure = Some(err);
                return;
            }

            summary.blocks += 1;
            summary.beats += u64::from(output.analysis.beat);
            if realtime {
                thread::sleep(block_period);
            }
        });

        match failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    })?;

    summary.discarded_samples = assembler.pending();
    out.flush()?;
    Ok(summary)
}

fn write_record<W: Write>(out: &mut W, record: &BlockRecord<'_>) -> Result<()> {
    serde_json::to_writer(&mut *out, record)?;
    out.write_all(b"\n")?;
    Ok(())
}
