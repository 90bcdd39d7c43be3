use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, TryLockError,
};

use crate::{AnalysisFrame, LightSyncError, Result};

/// Copy of the display-relevant analysis state at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumSnapshot {
    /// Smoothed magnitude per bin.
    pub magnitudes: Vec<f32>,
    pub beat: bool,
    pub energy: f32,
    /// Blocks processed when the snapshot was published.
    pub blocks: u64,
}

struct Shared {
    snapshot: Mutex<SpectrumSnapshot>,
    frequencies: Arc<[f32]>,
    skipped: AtomicU64,
}

/// Writer half, owned by the pipeline on the audio thread.
///
/// Publishing never waits: if the renderer currently holds the snapshot the
/// update is skipped and the renderer keeps the previous one.
pub struct RenderPublisher {
    shared: Arc<Shared>,
}

impl RenderPublisher {
    pub fn new(frequencies: Arc<[f32]>) -> Self {
        let snapshot = SpectrumSnapshot {
            magnitudes: vec![0.0; frequencies.len()],
            ..Default::default()
        };
        Self {
            shared: Arc::new(Shared {
                snapshot: Mutex::new(snapshot),
                frequencies,
                skipped: AtomicU64::new(0),
            }),
        }
    }

    /// Returns a read-only handle for the render loop.
    pub fn handle(&self) -> RenderHandle {
        RenderHandle {
            shared: self.shared.clone(),
        }
    }

    /// Copies `smoothed` and the latest beat/energy into the shared snapshot.
    /// Returns `false` when the update was skipped.
    pub fn publish(&self, smoothed: &[f32], frame: &AnalysisFrame, blocks: u64) -> bool {
        let mut guard = match self.shared.snapshot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => {
                self.shared.skipped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        // Same length every block, so this never reallocates.
        guard.magnitudes.clear();
        guard.magnitudes.extend_from_slice(smoothed);
        guard.beat = frame.beat;
        guard.energy = frame.energy;
        guard.blocks = blocks;
        true
    }
}

impl std::fmt::Debug for RenderPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPublisher")
            .field("bins", &self.shared.frequencies.len())
            .finish()
    }
}

/// Shared, read-only view of the smoothed spectrum for the render loop.
#[derive(Clone)]
pub struct RenderHandle {
    shared: Arc<Shared>,
}

impl RenderHandle {
    /// Clones the current snapshot.
    pub fn snapshot(&self) -> Result<SpectrumSnapshot> {
        Ok(self.lock()?.clone())
    }

    /// Copies the current snapshot into `target`, reusing its allocation.
    pub fn snapshot_into(&self, target: &mut SpectrumSnapshot) -> Result<()> {
        let guard = self.lock()?;
        target.magnitudes.clear();
        target.magnitudes.extend_from_slice(&guard.magnitudes);
        target.beat = guard.beat;
        target.energy = guard.energy;
        target.blocks = guard.blocks;
        Ok(())
    }

    /// Fixed bin-to-frequency table, in Hz.
    pub fn frequencies(&self) -> &[f32] {
        &self.shared.frequencies
    }

    /// Publishes dropped because the renderer was reading at the time.
    pub fn skipped_publishes(&self) -> u64 {
        self.shared.skipped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SpectrumSnapshot>> {
        self.shared
            .snapshot
            .lock()
            .map_err(|_| LightSyncError::msg("spectrum snapshot has been poisoned"))
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHandle").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> RenderPublisher {
        RenderPublisher::new(vec![0.0, 100.0, 200.0].into())
    }

    #[test]
    fn handle_sees_published_state() {
        let publisher = publisher();
        let handle = publisher.handle();

        let frame = AnalysisFrame {
            energy: 0.5,
            beat: true,
            ..Default::default()
        };
        assert!(publisher.publish(&[1.0, 2.0, 3.0], &frame, 7));

        let snapshot = handle.snapshot().unwrap();
        assert_eq!(snapshot.magnitudes, vec![1.0, 2.0, 3.0]);
        assert!(snapshot.beat);
        assert_eq!(snapshot.energy, 0.5);
        assert_eq!(snapshot.blocks, 7);
        assert_eq!(handle.frequencies(), &[0.0, 100.0, 200.0]);
    }

    #[test]
    fn publish_skips_while_reader_holds_the_lock() {
        let publisher = publisher();
        let handle = publisher.handle();
        let frame = AnalysisFrame::default();

        let guard = handle.lock().unwrap();
        assert!(!publisher.publish(&[9.0, 9.0, 9.0], &frame, 1));
        drop(guard);

        assert_eq!(handle.skipped_publishes(), 1);
        assert_eq!(handle.snapshot().unwrap().magnitudes, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn snapshot_into_reuses_buffer() {
        let publisher = publisher();
        let handle = publisher.handle();
        publisher.publish(&[4.0, 5.0, 6.0], &AnalysisFrame::default(), 2);

        let mut target = SpectrumSnapshot::default();
        handle.snapshot_into(&mut target).unwrap();
        assert_eq!(target.magnitudes, vec![4.0, 5.0, 6.0]);
        assert_eq!(target.blocks, 2);
    }

    #[test]
    fn reader_on_another_thread_gets_consistent_lengths() {
        let publisher = publisher();
        let handle = publisher.handle();

        let reader = std::thread::spawn(move || {
            for _ in 0..1_000 {
                let snapshot = handle.snapshot().unwrap();
                assert_eq!(snapshot.magnitudes.len(), 3);
            }
        });
        for block in 0..1_000 {
            publisher.publish(&[block as f32; 3], &AnalysisFrame::default(), block);
        }
        reader.join().unwrap();
    }
}
