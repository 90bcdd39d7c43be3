use crate::{LightSyncError, Result};

/// Fixed block geometry agreed with the capture layer at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub block_size: usize,
    pub channels: usize,
}

impl BlockLayout {
    pub fn new(block_size: usize, channels: usize) -> Self {
        Self {
            block_size,
            channels,
        }
    }

    /// Number of interleaved samples in one block.
    pub fn interleaved_len(&self) -> usize {
        self.block_size * self.channels
    }
}

/// Borrowed view over one block of interleaved samples.
#[derive(Debug, Clone, Copy)]
pub struct AudioBlock<'a> {
    samples: &'a [f32],
    channels: usize,
}

impl<'a> AudioBlock<'a> {
    /// Wraps interleaved samples, checking them against the expected layout.
    pub fn new(samples: &'a [f32], layout: BlockLayout) -> Result<Self> {
        if layout.channels == 0 || samples.len() != layout.interleaved_len() {
            return Err(LightSyncError::MalformedBlock {
                expected: layout.interleaved_len(),
                actual: samples.len(),
            });
        }
        Ok(Self {
            samples,
            channels: layout.channels,
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn interleaved(&self) -> &'a [f32] {
        self.samples
    }

    /// Averages the channels of every frame into `mono`, which must hold
    /// exactly [`AudioBlock::frames`] samples.
    pub fn mix_to_mono(&self, mono: &mut [f32]) {
        debug_assert_eq!(mono.len(), self.frames());
        if self.channels == 1 {
            mono.copy_from_slice(self.samples);
            return;
        }

        let scale = 1.0 / self.channels as f32;
        for (out, frame) in mono
            .iter_mut()
            .zip(self.samples.chunks_exact(self.channels))
        {
            *out = frame.iter().sum::<f32>() * scale;
        }
    }
}

/// Re-chunks capture callbacks of arbitrary length into fixed-size blocks.
///
/// Capture backends rarely honour a requested buffer size, so samples are
/// staged here until a whole block is available. The staging buffer is
/// allocated once; pushing never allocates.
#[derive(Debug)]
pub struct BlockAssembler {
    layout: BlockLayout,
    staging: Vec<f32>,
    filled: usize,
}

impl BlockAssembler {
    pub fn new(layout: BlockLayout) -> Self {
        Self {
            layout,
            staging: vec![0.0; layout.interleaved_len()],
            filled: 0,
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Interleaved samples currently waiting for the rest of their block.
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Appends interleaved samples and calls `on_block` once for every block
    /// completed by them. Returns the number of blocks emitted.
    pub fn push<F>(&mut self, mut samples: &[f32], mut on_block: F) -> usize
    where
        F: FnMut(AudioBlock<'_>),
    {
        let block_len = self.staging.len();
        let mut emitted = 0;

        while !samples.is_empty() {
            // Whole blocks bypass the staging buffer when nothing is pending.
            if self.filled == 0 && samples.len() >= block_len {
                let (block, rest) = samples.split_at(block_len);
                on_block(AudioBlock {
                    samples: block,
                    channels: self.layout.channels,
                });
                emitted += 1;
                samples = rest;
                continue;
            }

            let take = (block_len - self.filled).min(samples.len());
            self.staging[self.filled..self.filled + take].copy_from_slice(&samples[..take]);
            self.filled += take;
            samples = &samples[take..];

            if self.filled == block_len {
                on_block(AudioBlock {
                    samples: &self.staging,
                    channels: self.layout.channels,
                });
                emitted += 1;
                self.filled = 0;
            }
        }

        emitted
    }

    /// Drops any partially assembled block.
    pub fn clear(&mut self) {
        self.filled = 0;
    }
}
