use std::{
    io::{ErrorKind, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use iqfall_core::{
    encode_ft32_header, encode_samples, DataFrameHeaderExt, MetaUpdateExt, StreamHeaderExt,
};
use iqfall_types::{DataFrameHeader, MetaUpdate, ProtocolKind, StreamHeader};
use log::{debug, info, warn};

use crate::{Pacer, StreamerConfig, StreamerMetrics, StreamerResult, ToneSource};

/// Период опроса неблокирующего accept
const ACCEPT_POLL: Duration = Duration::from_millis(20);

/// Клиент, не читающий поток дольше этого, отключается
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Чем закончилось обслуживание клиента.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeEnd {
    /// Отдано `max_frames` кадров
    Completed,
    /// Соединение закрыто по `close_after`
    Closed,
    /// Сработал флаг остановки
    Stopped,
}

/// TCP сервер тестового потока (single-threaded, клиенты по очереди).
pub struct StreamSession {
    config: StreamerConfig,
    listener: TcpListener,
    metrics: Arc<StreamerMetrics>,
    stop_flag: Arc<AtomicBool>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StreamSession {
    /// Проверяет конфигурацию и открывает слушающий сокет.
    pub fn bind(config: StreamerConfig) -> StreamerResult<Self> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_addr)?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            listener,
            metrics: StreamerMetrics::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> StreamerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn metrics(&self) -> Arc<StreamerMetrics> {
        self.metrics.clone()
    }

    /// Принимает клиентов и отдаёт им поток. Блокирует до stop_flag или
    /// до исчерпания `max_clients`.
    pub fn run(self) -> StreamerResult<()> {
        let start = Instant::now();
        let mut served = 0u64;

        while !self.stop_flag.load(Ordering::Relaxed) {
            let (sock, peer) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            info!("Client {peer} connected");

            match self.serve_socket(sock) {
                Ok(end) => info!("Client {peer}: {end}"),
                Err(e) if e.is_client_gone() => info!("Client {peer} disconnected"),
                Err(e) => {
                    warn!("Client {peer}: {e}");
                    self.metrics.send_errors.fetch_add(1, Ordering::Relaxed);
                }
            }

            served += 1;
            self.metrics.clients_served.fetch_add(1, Ordering::Relaxed);

            if self.config.max_clients.is_some_and(|max| served >= max) {
                break;
            }
        }

        info!("\n{}", self.metrics.summary(&start));

        Ok(())
    }

    fn serve_socket(
        &self,
        mut sock: TcpStream,
    ) -> StreamerResult<ServeEnd> {
        sock.set_nonblocking(false)?;
        sock.set_nodelay(true)?;
        sock.set_write_timeout(Some(WRITE_TIMEOUT))?;

        self.serve(&mut sock)
    }

    /// Отдаёт поток одному клиенту: заголовок, затем кадры.
    pub fn serve<W: Write>(
        &self,
        out: &mut W,
    ) -> StreamerResult<ServeEnd> {
        let cfg = &self.config;
        let metrics = &self.metrics;
        let stop = &self.stop_flag;
        let order = cfg.byte_order;
        let n = cfg.frame_samples as usize;
        let magic = cfg.frame_magic();
        let stats_interval = Duration::from_secs(cfg.stats_interval_secs.max(1));

        match cfg.protocol {
            ProtocolKind::Ft32 => out.write_all(&encode_ft32_header(cfg.sample_rate, order))?,
            _ => {
                let header = StreamHeader {
                    gain_reduction: cfg.gain_reduction,
                    ..StreamHeader::new(cfg.sample_rate, cfg.sample_format, cfg.center_freq)
                };
                out.write_all(&header.encode(order))?;
            }
        }

        let mut tone = ToneSource::new(
            cfg.sample_rate,
            cfg.tone_hz,
            cfg.amplitude,
            cfg.noise,
            cfg.seed,
        );
        let mut pacer = Pacer::new(cfg.sample_rate, cfg.speed);
        let mut values = Vec::with_capacity(n * 2);
        let mut payload = Vec::with_capacity(n * cfg.sample_format.pair_size());
        let mut frame = Vec::with_capacity(cfg.frame_bytes());

        let session_start = Instant::now();
        let mut last_stats = Instant::now();
        let mut sequence = 0u32;
        let mut samples_sent = 0u64;
        let mut index = 0u64;

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(ServeEnd::Stopped);
            }
            if cfg.max_frames.is_some_and(|max| index >= max) {
                out.flush()?;
                return Ok(ServeEnd::Completed);
            }
            if cfg.close_after.is_some_and(|limit| index >= limit) {
                out.flush()?;
                return Ok(ServeEnd::Closed);
            }

            if cfg.skip_sequence_at == Some(index) {
                debug!("Skipping sequence number {sequence}");
                sequence = sequence.wrapping_add(1);
                metrics.sequence_skips.fetch_add(1, Ordering::Relaxed);
            }

            if let Some(every) = cfg.meta_every {
                if index > 0 && index % every == 0 {
                    let meta = MetaUpdate {
                        sequence,
                        center_freq: cfg.center_freq,
                        gain_reduction: cfg.gain_reduction,
                        lna_enabled: false,
                        sample_rate: None,
                        sample_format: None,
                    };
                    out.write_all(&meta.encode(order))?;
                    metrics.meta_sent.fetch_add(1, Ordering::Relaxed);
                }
            }

            tone.fill(n, &mut values);
            encode_samples(cfg.sample_format, order, &values, &mut payload);

            frame.clear();
            let header = DataFrameHeader::new(sequence, n as u32);
            frame.extend_from_slice(&header.encode(magic, order));
            frame.extend_from_slice(&payload);

            if cfg.realtime {
                pacer.wait_for(samples_sent, metrics);
            }

            out.write_all(&frame)?;

            metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
            metrics.samples_sent.fetch_add(n as u64, Ordering::Relaxed);
            metrics
                .bytes_sent
                .fetch_add(frame.len() as u64, Ordering::Relaxed);

            sequence = sequence.wrapping_add(1);
            samples_sent += n as u64;
            index += 1;

            if last_stats.elapsed() >= stats_interval {
                Self::log_progress(metrics, &session_start);
                last_stats = Instant::now();
            }
        }
    }

    fn log_progress(
        m: &StreamerMetrics,
        start: &Instant,
    ) {
        info!(
            "[ {:.0}s ] frames={} samples={} underruns={} timing_err={:.1}µs rate={:.3} Msps",
            start.elapsed().as_secs_f64(),
            m.frames_sent.load(Ordering::Relaxed),
            m.samples_sent.load(Ordering::Relaxed),
            m.underruns.load(Ordering::Relaxed),
            m.avg_timing_error_us(),
            m.throughput_msps(start),
        );
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for ServeEnd {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ServeEnd::Completed => write!(f, "all frames sent"),
            ServeEnd::Closed => write!(f, "closed early"),
            ServeEnd::Stopped => write!(f, "stopped"),
        }
    }
}
