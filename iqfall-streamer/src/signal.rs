use std::f64::consts::TAU;

use rand::{rngs::SmallRng, Rng, SeedableRng};

/// Генератор комплексного тона с необязательным шумом.
///
/// Фаза непрерывна между вызовами [`ToneSource::fill`], поэтому кадры
/// любой длины складываются в один чистый тон.
pub struct ToneSource {
    phase: f64,
    step: f64,
    amplitude: f32,
    noise: f32,
    rng: SmallRng,
}

impl ToneSource {
    pub fn new(
        sample_rate: u32,
        tone_hz: f64,
        amplitude: f32,
        noise: f32,
        seed: u64,
    ) -> Self {
        Self {
            phase: 0.0,
            step: TAU * tone_hz / sample_rate as f64,
            amplitude,
            noise,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Записывает `pairs` чередующихся I/Q значений в `out`.
    pub fn fill(
        &mut self,
        pairs: usize,
        out: &mut Vec<f32>,
    ) {
        out.clear();
        out.reserve(pairs * 2);

        let amp = self.amplitude as f64;

        for _ in 0..pairs {
            let mut i = (amp * self.phase.cos()) as f32;
            let mut q = (amp * self.phase.sin()) as f32;

            if self.noise > 0.0 {
                i += self.rng.gen_range(-self.noise..self.noise);
                q += self.rng.gen_range(-self.noise..self.noise);
            }

            out.push(i);
            out.push(q);

            self.phase = (self.phase + self.step) % TAU;
        }
    }
}
