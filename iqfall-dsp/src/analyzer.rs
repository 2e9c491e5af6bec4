//! Оконное БПФ и отображение бинов на столбцы экрана.

use std::{fmt, sync::Arc};

use iqfall_types::{IqSample, ResourceError};
use rustfft::{num_complex::Complex32, Fft, FftPlanner};

use crate::{try_alloc, window::blackman_harris};

/// Спектральный анализатор фиксированного размера.
///
/// Окно, план БПФ и рабочие буферы создаются один раз; `analyze` не
/// выделяет память.
pub struct SpectralAnalyzer {
    size: usize,
    sample_rate: f32,
    zoom_max_hz: f32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl fmt::Debug for SpectralAnalyzer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size)
            .field("sample_rate", &self.sample_rate)
            .field("zoom_max_hz", &self.zoom_max_hz)
            .finish()
    }
}

impl SpectralAnalyzer {
    pub fn new(
        size: usize,
        sample_rate: f32,
        zoom_max_hz: f32,
    ) -> Result<Self, ResourceError> {
        let size = size.max(2);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let zero = Complex32::new(0.0, 0.0);

        Ok(Self {
            size,
            sample_rate,
            zoom_max_hz,
            window: blackman_harris(size),
            buffer: try_alloc("FFT buffer", size, zero)?,
            scratch: try_alloc("FFT scratch", fft.get_inplace_scratch_len(), zero)?,
            fft,
        })
    }

    /// Применяет окно к I и Q и выполняет прямое БПФ.
    ///
    /// `samples` должен содержать ровно `size` выборок в хронологическом
    /// порядке; лишние игнорируются, недостающие считаются нулями.
    pub fn analyze(
        &mut self,
        samples: &[IqSample],
    ) {
        for (k, (dst, w)) in self.buffer.iter_mut().zip(&self.window).enumerate() {
            let s = samples.get(k).copied().unwrap_or(IqSample::ZERO);
            *dst = Complex32::new(s.i * w, s.q * w);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);
    }

    /// Нормированная амплитуда бина: `|X[k]| / N`.
    #[inline]
    pub fn magnitude(
        &self,
        bin: usize,
    ) -> f32 {
        self.buffer[bin.min(self.size - 1)].norm() / self.size as f32
    }

    /// Заполняет `out` амплитудами для `out.len()` столбцов экрана.
    pub fn map_columns(
        &self,
        out: &mut [f32],
    ) {
        let width = out.len();
        let hz_per_bin = self.hz_per_bin();

        for (col, dst) in out.iter_mut().enumerate() {
            let bin = column_to_bin(col, width, self.size, hz_per_bin, self.zoom_max_hz);
            *dst = self.magnitude(bin);
        }
    }

    /// Бин с максимальной амплитудой последнего спектра.
    pub fn peak_bin(&self) -> usize {
        self.buffer
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |(best, max), (k, x)| {
                let m = x.norm_sqr();
                if m > max {
                    (k, m)
                } else {
                    (best, max)
                }
            })
            .0
    }

    /// Частота бина со знаком (верхняя половина: отрицательные частоты).
    pub fn bin_frequency(
        &self,
        bin: usize,
    ) -> f32 {
        let signed = if bin < self.size / 2 {
            bin as f32
        } else {
            bin as f32 - self.size as f32
        };
        signed * self.hz_per_bin()
    }

    pub fn hz_per_bin(&self) -> f32 {
        self.sample_rate / self.size as f32
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn zoom_max_hz(&self) -> f32 {
        self.zoom_max_hz
    }
}

/// Частота, соответствующая столбцу: от `-zoom` у левого края до `+zoom`.
#[inline]
pub fn column_frequency(
    col: usize,
    width: usize,
    zoom_max_hz: f32,
) -> f32 {
    (col as f32 / width.max(1) as f32 - 0.5) * 2.0 * zoom_max_hz
}

/// Бин БПФ для столбца. Отрицательные частоты заворачиваются в верхнюю
/// половину спектра, результат ограничен `[0, fft_size - 1]`.
#[inline]
pub fn column_to_bin(
    col: usize,
    width: usize,
    fft_size: usize,
    hz_per_bin: f32,
    zoom_max_hz: f32,
) -> usize {
    let freq = column_frequency(col, width, zoom_max_hz);
    let n = fft_size as i64;

    // Приведение к целому отбрасывает дробную часть: это и есть округление
    // после сдвига на ±0.5
    let bin = if freq >= 0.0 {
        (freq / hz_per_bin + 0.5) as i64
    } else {
        n + (freq / hz_per_bin - 0.5) as i64
    };

    bin.clamp(0, n - 1) as usize
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use rand::{rngs::SmallRng, Rng, SeedableRng};

    use super::*;

    const RATE: f32 = 12_000.0;

    fn tone(
        freq: f32,
        n: usize,
    ) -> Vec<IqSample> {
        (0..n)
            .map(|k| {
                let ph = 2.0 * PI * freq * k as f32 / RATE;
                IqSample::new(0.5 * ph.cos(), 0.5 * ph.sin())
            })
            .collect()
    }

    #[test]
    fn test_column_mapping_edges() {
        let hz = RATE / 2048.0;

        // Центр экрана: нулевая частота
        assert_eq!(column_to_bin(512, 1024, 2048, hz, 5000.0), 0);
        // Левый край: -5000 Гц → N - 853
        assert_eq!(column_to_bin(0, 1024, 2048, hz, 5000.0), 2048 - 853);
        // Правее центра: положительные бины
        assert!(column_to_bin(1023, 1024, 2048, hz, 5000.0) < 1024);
    }

    #[test]
    fn test_column_mapping_clamped() {
        // Зум шире полосы: бины не выходят за пределы
        for col in 0..64 {
            let bin = column_to_bin(col, 64, 16, 1.0, 1_000.0);
            assert!(bin < 16);
        }
    }

    #[test]
    fn test_peak_bin_for_tone() {
        let mut a = SpectralAnalyzer::new(2048, RATE, 5000.0).unwrap();
        a.analyze(&tone(1_000.0, 2048));

        let expected = (1_000.0 / a.hz_per_bin()).round() as i64;
        assert!((a.peak_bin() as i64 - expected).abs() <= 1);
    }

    #[test]
    fn test_peak_column_within_one_bin() {
        let mut a = SpectralAnalyzer::new(2048, RATE, 5000.0).unwrap();

        for freq in [1_000.0f32, -2_500.0, 3_300.0] {
            a.analyze(&tone(freq, 2048));

            let width = 2048;
            let mut cols = vec![0.0f32; width];
            a.map_columns(&mut cols);

            let (peak_col, _) = cols
                .iter()
                .enumerate()
                .fold((0, f32::MIN), |acc, (k, &m)| if m > acc.1 { (k, m) } else { acc });

            let col_freq = column_frequency(peak_col, width, 5000.0);
            let bins_off = (col_freq - freq).abs() / a.hz_per_bin();
            assert!(bins_off <= 1.0, "{freq} Hz: column at {col_freq} Hz");
        }
    }

    #[test]
    fn test_tone_found_in_noise() {
        let mut rng = SmallRng::seed_from_u64(7);
        let noisy: Vec<IqSample> = tone(-1_800.0, 2048)
            .into_iter()
            .map(|s| {
                IqSample::new(
                    s.i + rng.gen_range(-0.3..0.3),
                    s.q + rng.gen_range(-0.3..0.3),
                )
            })
            .collect();

        let mut a = SpectralAnalyzer::new(2048, RATE, 5000.0).unwrap();
        a.analyze(&noisy);

        let peak = a.bin_frequency(a.peak_bin());
        assert!((peak + 1_800.0).abs() <= a.hz_per_bin(), "{peak}");
    }

    #[test]
    fn test_magnitude_normalized() {
        let mut a = SpectralAnalyzer::new(2048, RATE, 5000.0).unwrap();
        a.analyze(&tone(1_500.0, 2048));

        // Амплитуда 0.5, когерентное усиление окна ≈ 0.359
        let peak = a.magnitude(a.peak_bin());
        assert!(peak > 0.15 && peak < 0.2, "{peak}");
    }

    #[test]
    fn test_bin_frequency_sign() {
        let a = SpectralAnalyzer::new(2048, RATE, 5000.0).unwrap();

        assert_eq!(a.bin_frequency(0), 0.0);
        assert!(a.bin_frequency(10) > 0.0);
        assert!(a.bin_frequency(2040) < 0.0);
    }

    #[test]
    fn test_short_input_zero_padded() {
        let mut a = SpectralAnalyzer::new(64, RATE, 5000.0).unwrap();
        a.analyze(&[]);

        assert_eq!(a.magnitude(0), 0.0);
    }
}
