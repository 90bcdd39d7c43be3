use crate::config::WarmupPolicy;

/// Root-mean-square level of a block. An empty or silent block yields 0.
pub fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

/// Fixed-capacity ring of the most recent block energies.
///
/// Pushing into a full history evicts the oldest entry. Storage is allocated
/// once at construction.
#[derive(Debug, Clone)]
pub struct EnergyHistory {
    values: Box<[f32]>,
    /// Index the next push writes to.
    head: usize,
    len: usize,
}

impl EnergyHistory {
    /// Creates a history of `capacity` entries, seeded according to `warmup`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, warmup: WarmupPolicy) -> Self {
        assert!(capacity > 0, "energy history needs a positive capacity");
        let len = match warmup {
            WarmupPolicy::ZeroPadded => capacity,
            WarmupPolicy::GrowFromEmpty => 0,
        };
        Self {
            values: vec![0.0; capacity].into_boxed_slice(),
            head: 0,
            len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.values.len()
    }

    pub fn push(&mut self, energy: f32) {
        self.values[self.head] = energy;
        self.head = (self.head + 1) % self.values.len();
        if self.len < self.values.len() {
            self.len += 1;
        }
    }

    /// Buffered values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let capacity = self.values.len();
        let start = (self.head + capacity - self.len) % capacity;
        (0..self.len).map(move |offset| self.values[(start + offset) % capacity])
    }

    /// Mean over whatever is currently buffered, 0 when empty.
    pub fn mean(&self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f32>() / self.len as f32
    }
}

/// Adaptive-threshold onset flag: a block is a beat when its energy exceeds
/// `sensitivity` times the recent average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatDetector {
    sensitivity: f32,
}

impl BeatDetector {
    pub fn new(sensitivity: f32) -> Self {
        Self { sensitivity }
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// `history` is expected to already contain `energy`.
    pub fn detect(&self, energy: f32, history: &EnergyHistory) -> bool {
        energy > self.sensitivity * history.mean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_and_silent_blocks() {
        assert_eq!(compute_rms(&[0.0; 64]), 0.0);
        assert!((compute_rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        assert!((compute_rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn zero_padded_history_starts_full() {
        let history = EnergyHistory::new(43, WarmupPolicy::ZeroPadded);
        assert_eq!(history.len(), 43);
        assert!(history.is_full());
        assert_eq!(history.mean(), 0.0);
    }

    #[test]
    fn grown_history_averages_real_blocks_only() {
        let mut history = EnergyHistory::new(43, WarmupPolicy::GrowFromEmpty);
        assert!(history.is_empty());
        history.push(2.0);
        history.push(4.0);
        assert_eq!(history.len(), 2);
        assert_eq!(history.mean(), 3.0);
    }

    #[test]
    fn never_exceeds_capacity_and_evicts_oldest() {
        let mut history = EnergyHistory::new(4, WarmupPolicy::GrowFromEmpty);
        for value in 1..=4 {
            history.push(value as f32);
        }
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0, 4.0]);

        history.push(5.0);
        assert_eq!(history.len(), 4);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0, 5.0]);

        for value in 6..200 {
            history.push(value as f32);
            assert!(history.len() <= history.capacity());
        }
        assert_eq!(history.iter().next(), Some(196.0));
    }

    #[test]
    fn beat_fires_above_scaled_average() {
        let detector = BeatDetector::new(1.3);

        let mut history = EnergyHistory::new(43, WarmupPolicy::ZeroPadded);
        for _ in 0..43 {
            history.push(10.0);
        }
        let mut loud = history.clone();
        loud.push(20.0);
        assert!(detector.detect(20.0, &loud));

        let mut mild = history.clone();
        mild.push(12.0);
        assert!(!detector.detect(12.0, &mild));
    }

    #[test]
    fn beat_is_a_pure_function_of_its_inputs() {
        let detector = BeatDetector::new(1.3);
        let mut history = EnergyHistory::new(8, WarmupPolicy::GrowFromEmpty);
        for value in [0.2, 0.1, 0.4, 0.3] {
            history.push(value);
        }
        let first = detector.detect(0.45, &history);
        for _ in 0..10 {
            assert_eq!(detector.detect(0.45, &history), first);
        }
    }

    #[test]
    fn silence_never_beats() {
        let detector = BeatDetector::new(1.3);
        let mut history = EnergyHistory::new(43, WarmupPolicy::ZeroPadded);
        history.push(0.0);
        assert!(!detector.detect(0.0, &history));
    }

    #[test]
    fn zero_padding_makes_early_onsets_sensitive() {
        let detector = BeatDetector::new(1.3);

        let mut padded = EnergyHistory::new(43, WarmupPolicy::ZeroPadded);
        let mut grown = EnergyHistory::new(43, WarmupPolicy::GrowFromEmpty);
        padded.push(0.1);
        grown.push(0.1);

        // Padded: 0.1 > 1.3 * 0.1 / 43. Grown: 0.1 > 1.3 * 0.1 is false.
        assert!(detector.detect(0.1, &padded));
        assert!(!detector.detect(0.1, &grown));
    }
}
