use serde::{Deserialize, Serialize};

use crate::{
    audio::{AudioBlock, BlockLayout},
    config::AppConfig,
    render::{RenderHandle, RenderPublisher},
    AnalysisEngine, AnalysisFrame, ControlFrame, LightSyncError, Quantizer, Result,
};

/// Everything one block produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockOutput {
    pub analysis: AnalysisFrame,
    pub frame: ControlFrame,
}

/// Block-synchronous analysis pipeline.
///
/// Owns all cross-block state. It has no thread of its own: the capture
/// collaborator calls [`Pipeline::process_block`] once per block and gets the
/// control frame back. Sending that frame is the caller's business.
#[derive(Debug)]
pub struct Pipeline {
    layout: BlockLayout,
    sample_rate: u32,
    mono: Vec<f32>,
    engine: AnalysisEngine,
    quantizer: Quantizer,
    publisher: RenderPublisher,
}

impl Pipeline {
    /// Builds a pipeline from a validated configuration. Configuration faults
    /// surface here, before any block is processed.
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let audio = &config.audio;
        let layout = BlockLayout::new(audio.block_size, audio.channels);
        let engine = AnalysisEngine::new(audio.block_size, audio.sample_rate, &config.analysis);
        let publisher = RenderPublisher::new(engine.spectral().frequencies().clone());

        tracing::info!(
            sample_rate = audio.sample_rate,
            block_size = audio.block_size,
            channels = audio.channels,
            deadline_ms = audio.block_duration_secs() * 1_000.0,
            "analysis pipeline ready"
        );

        Ok(Self {
            layout,
            sample_rate: audio.sample_rate,
            mono: vec![0.0; audio.block_size],
            engine,
            quantizer: Quantizer::new(config.analysis.quantization_ceiling),
            publisher,
        })
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Read-only view for the render loop.
    pub fn render_handle(&self) -> RenderHandle {
        self.publisher.handle()
    }

    pub fn engine(&self) -> &AnalysisEngine {
        &self.engine
    }

    /// Processes one interleaved block.
    pub fn process_interleaved(&mut self, samples: &[f32]) -> Result<BlockOutput> {
        let block = AudioBlock::new(samples, self.layout)?;
        self.process_block(block)
    }

    /// Runs a block through every stage. A block whose geometry does not
    /// match the configured layout is rejected before any state changes.
    pub fn process_block(&mut self, block: AudioBlock<'_>) -> Result<BlockOutput> {
        if block.channels() != self.layout.channels || block.frames() != self.layout.block_size
        {
            return Err(LightSyncError::MalformedBlock {
                expected: self.layout.interleaved_len(),
                actual: block.interleaved().len(),
            });
        }

        block.mix_to_mono(&mut self.mono);
        let analysis = self.engine.process_mono(&self.mono)?;
        let frame = self.quantizer.frame(&analysis);

        self.publisher.publish(
            self.engine.spectral().smoothed(),
            &analysis,
            self.engine.processed_blocks(),
        );

        Ok(BlockOutput { analysis, frame })
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::config::AudioConfig;

    fn stereo_config() -> AppConfig {
        AppConfig {
            audio: AudioConfig {
                channels: 2,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn invalid_configuration_is_fatal() {
        let mut config = AppConfig::default();
        config.audio.block_size = 0;
        assert!(matches!(
            Pipeline::new(&config),
            Err(LightSyncError::Config(_))
        ));
    }

    #[test]
    fn silent_block_emits_zero_frame() {
        let mut pipeline = Pipeline::new(&AppConfig::default()).unwrap();
        let output = pipeline.process_interleaved(&[0.0; 1024]).unwrap();
        assert_eq!(output.frame, ControlFrame::default());
        assert_eq!(output.frame.to_line(), "0,0,0,0\n");
    }

    #[test]
    fn malformed_block_leaves_state_untouched() {
        let mut pipeline = Pipeline::new(&stereo_config()).unwrap();
        let err = pipeline.process_interleaved(&[1.0; 1024]).unwrap_err();
        assert!(matches!(
            err,
            LightSyncError::MalformedBlock {
                expected: 2048,
                actual: 1024
            }
        ));
        assert_eq!(pipeline.engine().processed_blocks(), 0);
        assert!(pipeline
            .engine()
            .spectral()
            .smoothed()
            .iter()
            .all(|m| *m == 0.0));
    }

    #[test]
    fn block_with_foreign_layout_is_rejected() {
        let mut pipeline = Pipeline::new(&AppConfig::default()).unwrap();
        let samples = [0.0; 1024];
        let block = AudioBlock::new(&samples, BlockLayout::new(512, 2)).unwrap();
        assert!(pipeline.process_block(block).is_err());
    }

    #[test]
    fn stereo_input_is_reduced_before_analysis() {
        let mut pipeline = Pipeline::new(&stereo_config()).unwrap();
        // Left and right cancel out.
        let samples: Vec<f32> = (0..1024)
            .flat_map(|i| {
                let s = (2.0 * PI * 100.0 * i as f32 / 44_100.0).sin();
                [s, -s]
            })
            .collect();
        let output = pipeline.process_interleaved(&samples).unwrap();
        assert_eq!(output.analysis.energy, 0.0);
        assert_eq!(output.frame, ControlFrame::default());
    }

    #[test]
    fn render_handle_tracks_smoothed_spectrum() {
        let mut pipeline = Pipeline::new(&AppConfig::default()).unwrap();
        let handle = pipeline.render_handle();
        assert_eq!(handle.frequencies().len(), 513);

        let tone: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * 1_000.0 * i as f32 / 44_100.0).sin())
            .collect();
        pipeline.process_interleaved(&tone).unwrap();

        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.blocks, 1);
        assert_eq!(snapshot.magnitudes, pipeline.engine().spectral().smoothed());
        assert!(snapshot.energy > 0.0);
    }
}
