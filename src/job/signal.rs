use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Cancellation flag shared by the controller and one run.
/// Once raised it stays raised; every run gets a fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Progress of one run in `[0, 1]`, stored as `f64` bits.
///
/// `publish` only ever raises the stored value, so readers never observe a
/// regression even if an older value is published late.
#[derive(Debug, Clone, Default)]
pub struct ProgressCell {
    bits: Arc<AtomicU64>,
}

impl ProgressCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a progress value. Values are clamped into `[0, 1]`, NaN is ignored.
    pub fn publish(&self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        // `+ 0.0` folds -0.0 into 0.0
        let progress = num::clamp(progress, 0.0, 1.0) + 0.0;
        // non-negative f64 bit patterns order the same way as the values
        self.bits.fetch_max(progress.to_bits(), Ordering::AcqRel);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}
