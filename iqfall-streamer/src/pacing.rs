use std::{
    sync::atomic::Ordering,
    thread,
    time::{Duration, Instant},
};

use crate::StreamerMetrics;

/// Отставание, после которого кадр считается underrun
const UNDERRUN_LAG_NS: u64 = 1_000_000;

/// Выдерживает темп потока по числу уже отправленных выборок.
///
/// Для каждого кадра вычисляется момент отправки относительно начала
/// соединения с учётом `speed`. Если опережаем, спим; если отстаём, фиксируем
/// underrun и отправляем без задержки.
pub struct Pacer {
    sample_rate: u64,
    speed: f64,
    start: Instant,
}

impl Pacer {
    pub fn new(
        sample_rate: u32,
        speed: f64,
    ) -> Self {
        Self {
            sample_rate: sample_rate.max(1) as u64,
            speed: speed.max(0.01),
            start: Instant::now(),
        }
    }

    /// Момент отправки выборки с номером `samples` (нс от начала).
    pub fn target_ns(
        &self,
        samples: u64,
    ) -> u64 {
        let stream_ns = samples as u128 * 1_000_000_000 / self.sample_rate as u128;

        (stream_ns as f64 / self.speed) as u64
    }

    /// Ждёт момента отправки кадра, начинающегося с выборки `samples`.
    ///
    /// Возвращает ошибку темпа (нс).
    pub fn wait_for(
        &mut self,
        samples: u64,
        metrics: &StreamerMetrics,
    ) -> u64 {
        let target = self.target_ns(samples);
        let elapsed = self.start.elapsed().as_nanos() as u64;

        let error = if target > elapsed {
            thread::sleep(Duration::from_nanos(target - elapsed));

            let actual = self.start.elapsed().as_nanos() as u64;
            actual.saturating_sub(target)
        } else {
            let lag = elapsed - target;
            if lag > UNDERRUN_LAG_NS {
                metrics.underruns.fetch_add(1, Ordering::Relaxed);
            }
            lag
        };

        metrics
            .timing_error_ns_total
            .fetch_add(error, Ordering::Relaxed);

        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_scales_with_speed() {
        let normal = Pacer::new(1_000_000, 1.0);
        let fast = Pacer::new(1_000_000, 2.0);

        assert_eq!(normal.target_ns(500_000), 500_000_000);
        assert_eq!(fast.target_ns(500_000), 250_000_000);
    }

    #[test]
    fn test_waits_until_frame_time() {
        let metrics = StreamerMetrics::new();
        let mut pacer = Pacer::new(1_000, 1.0);

        pacer.wait_for(0, &metrics);

        // 50 выборок при 1 кГц: 50 мс
        let before = Instant::now();
        pacer.wait_for(50, &metrics);
        let elapsed = before.elapsed();

        assert!(
            elapsed.as_millis() >= 30,
            "Expected pause ~50ms, got {}ms",
            elapsed.as_millis()
        );
        assert!(
            elapsed.as_millis() <= 150,
            "Pause too long: {}ms",
            elapsed.as_millis()
        );
    }

    #[test]
    fn test_lagging_counts_underrun() {
        let metrics = StreamerMetrics::new();
        let mut pacer = Pacer::new(1_000_000, 1.0);

        thread::sleep(Duration::from_millis(20));
        pacer.wait_for(1_000, &metrics);

        assert_eq!(metrics.underruns.load(Ordering::Relaxed), 1);
    }
}
