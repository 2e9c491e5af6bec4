use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Lock-free метрики тестового источника.
#[derive(Debug, Default)]
pub struct StreamerMetrics {
    pub clients_served: AtomicU64,
    pub frames_sent: AtomicU64,
    pub meta_sent: AtomicU64,
    pub samples_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub sequence_skips: AtomicU64,
    pub underruns: AtomicU64,
    pub send_errors: AtomicU64,
    pub timing_error_ns_total: AtomicU64,
}

/// Снимок метрик для вывода.
#[derive(Debug, Clone)]
pub struct StreamerSummary {
    pub duration_secs: f64,
    pub clients_served: u64,
    pub frames_sent: u64,
    pub meta_sent: u64,
    pub samples_sent: u64,
    pub bytes_sent: u64,
    pub sequence_skips: u64,
    pub underruns: u64,
    pub send_errors: u64,
    pub throughput_msps: f64,
    pub avg_timing_error_us: f64,
}

impl StreamerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Средняя скорость отправки (Msps).
    pub fn throughput_msps(
        &self,
        start: &Instant,
    ) -> f64 {
        let secs = start.elapsed().as_secs_f64().max(1e-9);

        self.samples_sent.load(Ordering::Relaxed) as f64 / secs / 1_000_000.0
    }

    /// Средняя ошибка темпа на кадр (мкс).
    pub fn avg_timing_error_us(&self) -> f64 {
        let frames = self.frames_sent.load(Ordering::Relaxed);

        if frames == 0 {
            return 0.0;
        }

        self.timing_error_ns_total.load(Ordering::Relaxed) as f64 / frames as f64 / 1_000.0
    }

    pub fn summary(
        &self,
        start: &Instant,
    ) -> StreamerSummary {
        StreamerSummary {
            duration_secs: start.elapsed().as_secs_f64(),
            clients_served: self.clients_served.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            meta_sent: self.meta_sent.load(Ordering::Relaxed),
            samples_sent: self.samples_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            sequence_skips: self.sequence_skips.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            throughput_msps: self.throughput_msps(start),
            avg_timing_error_us: self.avg_timing_error_us(),
        }
    }
}

impl std::fmt::Display for StreamerSummary {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(f, "  Duration      : {:.1}s", self.duration_secs)?;
        writeln!(f, "  Clients       : {}", self.clients_served)?;
        writeln!(f, "  Frames sent   : {} (+{} META)", self.frames_sent, self.meta_sent)?;
        writeln!(f, "  Samples sent  : {}", self.samples_sent)?;
        writeln!(f, "  Bytes sent    : {:.1} MB", self.bytes_sent as f64 / 1e6)?;
        writeln!(f, "  Seq skips     : {}", self.sequence_skips)?;
        writeln!(f, "  Underruns     : {}", self.underruns)?;
        writeln!(f, "  Send errors   : {}", self.send_errors)?;
        writeln!(f, "  Throughput    : {:.3} Msps", self.throughput_msps)?;
        writeln!(f, "  Timing error  : {:.1} µs avg", self.avg_timing_error_us)?;
        write!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")
    }
}
