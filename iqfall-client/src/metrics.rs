use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Счётчики сессии клиента. Обновляются lock-free, читаются из любого
/// потока (в том числе из обработчика Ctrl+C).
#[derive(Debug, Default)]
pub struct ClientMetrics {
    pub frames_received: AtomicU64,
    pub samples_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub dropped_frames: AtomicU64,
    pub dropped_pairs: AtomicU64,
    pub meta_updates: AtomicU64,
    pub spectral_rows: AtomicU64,
    pub connect_attempts: AtomicU64,
    pub connects: AtomicU64,
    pub disconnects: AtomicU64,
}

/// Снимок метрик для вывода и тестов.
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub duration_secs: f64,
    pub frames_received: u64,
    pub samples_received: u64,
    pub bytes_received: u64,
    pub dropped_frames: u64,
    pub dropped_pairs: u64,
    pub meta_updates: u64,
    pub spectral_rows: u64,
    pub connect_attempts: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub rows_per_sec: f64,
    pub frame_loss_pct: f64,
}

impl ClientMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Частота появления строк водопада.
    pub fn rows_per_sec(
        &self,
        elapsed: &Instant,
    ) -> f64 {
        let secs = elapsed.elapsed().as_secs_f64();

        if secs < 1e-9 {
            return 0.0;
        }

        self.spectral_rows.load(Ordering::Relaxed) as f64 / secs
    }

    /// Процент потерянных кадров (0.0-100.0) по разрывам нумерации.
    pub fn frame_loss_pct(&self) -> f64 {
        let received = self.frames_received.load(Ordering::Relaxed);
        let dropped = self.dropped_frames.load(Ordering::Relaxed);
        let total = received + dropped;

        if total == 0 {
            0.0
        } else {
            dropped as f64 / total as f64 * 100.0
        }
    }

    pub fn summary(
        &self,
        elapsed: &Instant,
    ) -> MetricsSummary {
        MetricsSummary {
            duration_secs: elapsed.elapsed().as_secs_f64(),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            samples_received: self.samples_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            dropped_pairs: self.dropped_pairs.load(Ordering::Relaxed),
            meta_updates: self.meta_updates.load(Ordering::Relaxed),
            spectral_rows: self.spectral_rows.load(Ordering::Relaxed),
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            rows_per_sec: self.rows_per_sec(elapsed),
            frame_loss_pct: self.frame_loss_pct(),
        }
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.1}s", self.duration_secs)?;
        writeln!(f, "  Frames        : {}", self.frames_received)?;
        writeln!(f, "  Samples       : {}", self.samples_received)?;
        writeln!(
            f,
            "  Received      : {:.1} MB",
            self.bytes_received as f64 / 1e6
        )?;
        writeln!(
            f,
            "  Dropped       : {} frame(s) ({:.2}%), {} pair(s)",
            self.dropped_frames, self.frame_loss_pct, self.dropped_pairs
        )?;
        writeln!(f, "  META updates  : {}", self.meta_updates)?;
        writeln!(
            f,
            "  Rows          : {} ({:.1}/s)",
            self.spectral_rows, self.rows_per_sec
        )?;
        writeln!(
            f,
            "  Connections   : {} of {} attempt(s), {} lost",
            self.connects, self.connect_attempts, self.disconnects
        )?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
