//! Синтетический сигнал для проверки отображения без сети: постоянный тон
//! 1 кГц, медленно качающийся тон и слабый шум. Выборки идут сразу на
//! частоте отображения и выдаются в темпе реального времени.

use std::{f32::consts::TAU, time::Instant};

use iqfall_dsp::{DISPLAY_SAMPLE_RATE, FFT_SIZE};
use iqfall_types::IqSample;
use rand::{rngs::SmallRng, Rng, SeedableRng};

pub const TONE_HZ: f32 = 1_000.0;
const TONE_AMPLITUDE: f32 = 0.5;

const SWEEP_LOW_HZ: f32 = -4_000.0;
const SWEEP_HIGH_HZ: f32 = 4_000.0;
const SWEEP_PERIOD_SECS: f32 = 10.0;
const SWEEP_AMPLITUDE: f32 = 0.2;

const NOISE_AMPLITUDE: f32 = 0.01;

/// Больше этого за один тик не выдаётся (после паузы отставание
/// отбрасывается).
const MAX_BATCH: usize = FFT_SIZE * 2;

pub struct TestPattern {
    rng: SmallRng,
    sample_rate: f32,
    tone_phase: f32,
    sweep_phase: f32,
    sweep_pos: f32,
    started: Option<Instant>,
    emitted: u64,
}

impl TestPattern {
    pub fn new() -> Self {
        Self::with_seed(0x1F_A11)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            sample_rate: DISPLAY_SAMPLE_RATE as f32,
            tone_phase: 0.0,
            sweep_phase: 0.0,
            sweep_pos: 0.0,
            started: None,
            emitted: 0,
        }
    }

    /// Сколько выборок нужно выдать к моменту `now`.
    pub fn due(
        &mut self,
        now: Instant,
    ) -> usize {
        let started = *self.started.get_or_insert(now);
        let elapsed_ns = now.saturating_duration_since(started).as_nanos();
        let target = (elapsed_ns * DISPLAY_SAMPLE_RATE as u128 / 1_000_000_000) as u64;
        let pending = target.saturating_sub(self.emitted);

        if pending > MAX_BATCH as u64 {
            // Отстали: пропускаем лишнее, чтобы не рисовать пачку строк разом
            self.emitted = target - MAX_BATCH as u64;
            return MAX_BATCH;
        }

        pending as usize
    }

    /// Следующая выборка сигнала.
    pub fn next_sample(&mut self) -> IqSample {
        let sweep_hz = SWEEP_LOW_HZ + (SWEEP_HIGH_HZ - SWEEP_LOW_HZ) * self.sweep_pos;

        let mut i = TONE_AMPLITUDE * self.tone_phase.cos() + SWEEP_AMPLITUDE * self.sweep_phase.cos();
        let mut q = TONE_AMPLITUDE * self.tone_phase.sin() + SWEEP_AMPLITUDE * self.sweep_phase.sin();
        i += NOISE_AMPLITUDE * self.rng.gen_range(-1.0f32..1.0);
        q += NOISE_AMPLITUDE * self.rng.gen_range(-1.0f32..1.0);

        self.tone_phase = (self.tone_phase + TAU * TONE_HZ / self.sample_rate) % TAU;
        self.sweep_phase = (self.sweep_phase + TAU * sweep_hz / self.sample_rate).rem_euclid(TAU);
        self.sweep_pos = (self.sweep_pos + 1.0 / (SWEEP_PERIOD_SECS * self.sample_rate)) % 1.0;
        self.emitted += 1;

        IqSample::new(i, q)
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Default for TestPattern {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use iqfall_dsp::WaterfallPipeline;

    use super::*;

    #[test]
    fn test_pacing_follows_clock() {
        let mut p = TestPattern::new();
        let t0 = Instant::now();

        assert_eq!(p.due(t0), 0);

        let n = p.due(t0 + Duration::from_millis(100));
        assert_eq!(n, 1_200);
        for _ in 0..n {
            p.next_sample();
        }

        assert_eq!(p.due(t0 + Duration::from_millis(150)), 600);
    }

    #[test]
    fn test_backlog_is_capped() {
        let mut p = TestPattern::new();
        let t0 = Instant::now();
        p.due(t0);

        assert_eq!(p.due(t0 + Duration::from_secs(10)), MAX_BATCH);
    }

    #[test]
    fn test_amplitude_bounded() {
        let mut p = TestPattern::with_seed(1);

        for _ in 0..10_000 {
            let s = p.next_sample();
            assert!(s.i.abs() <= 0.72 && s.q.abs() <= 0.72, "{s:?}");
        }
    }

    #[test]
    fn test_tone_is_brightest() {
        let mut p = TestPattern::with_seed(3);
        let mut pipeline = WaterfallPipeline::new(512, 64).unwrap();

        for _ in 0..FFT_SIZE {
            pipeline.push_iq(p.next_sample());
        }
        assert!(pipeline.process_if_ready());

        let peak = pipeline.analyzer().peak_bin();
        let freq = pipeline.analyzer().bin_frequency(peak);
        let hz_per_bin = pipeline.analyzer().hz_per_bin();

        assert!((freq - TONE_HZ).abs() <= hz_per_bin, "peak at {freq} Hz");
    }
}
