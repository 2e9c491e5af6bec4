//! Жизненный цикл соединения с источником.
//!
//! ```text
//! Disconnected → Connecting → Handshaking → Streaming
//!       ↑______________|______________|__________|   (любая ошибка)
//! ```
//!
//! Попытка подключения начинается из `Disconnected` по одному из трёх
//! поводов: найден новый источник, истёк интервал повтора, действие
//! пользователя. После любой ошибки запоминается момент, от которого
//! отсчитывается следующий автоматический повтор.

use std::{
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    sync::{atomic::Ordering, Arc},
    time::{Duration, Instant},
};

use iqfall_core::{open_codec, Frame, SampleFrame, StreamCodec};
use iqfall_types::{ByteOrderKind, MetaUpdate, ProtocolError, ProtocolKind, StreamInfo};
use log::{info, warn};

use crate::{metrics::ClientMetrics, ClientError, ClientOptions, ClientResult};

/// Состояние соединения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Streaming,
}

/// Результат одного опроса потока.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Не подключены или в этом такте данных нет
    Idle,
    /// Кадр с выборками передан обработчику
    Samples {
        sample_count: u32,
        dropped: Option<u32>,
    },
    /// Обновление частоты/усиления; поток продолжается
    Meta(MetaUpdate),
    /// Источник сменил частоту дискретизации или формат: соединение
    /// закрыто, повторное подключение выполняется без ожидания
    StreamChanged(MetaUpdate),
}

pub struct ConnectionManager {
    host: String,
    port: u16,
    protocol: ProtocolKind,
    byte_order: ByteOrderKind,
    reconnect_interval: Duration,
    handshake_timeout: Duration,
    poll_timeout: Duration,
    state: ConnectionState,
    socket: Option<TcpStream>,
    codec: Option<Box<dyn StreamCodec>>,
    info: Option<StreamInfo>,
    last_attempt: Option<Instant>,
    reconnect_now: bool,
    status: String,
    metrics: Arc<ClientMetrics>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ConnectionManager {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        options: &ClientOptions,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: options.protocol,
            byte_order: options.byte_order,
            reconnect_interval: options.reconnect_interval,
            handshake_timeout: options.handshake_timeout,
            poll_timeout: options.poll_timeout,
            state: ConnectionState::Disconnected,
            socket: None,
            codec: None,
            info: None,
            last_attempt: None,
            reconnect_now: false,
            status: "DISCONNECTED".to_string(),
            metrics,
        }
    }

    /// Подключается и выполняет рукопожатие.
    ///
    /// При ошибке соединение остаётся в `Disconnected`, а `now` становится
    /// точкой отсчёта интервала повтора.
    pub fn connect(
        &mut self,
        now: Instant,
    ) -> ClientResult<StreamInfo> {
        if let (ConnectionState::Streaming, Some(info)) = (self.state, &self.info) {
            return Ok(info.clone());
        }

        self.metrics.connect_attempts.fetch_add(1, Ordering::Relaxed);
        self.reconnect_now = false;
        self.last_attempt = Some(now);

        match self.try_connect() {
            Ok(info) => {
                info!(
                    "Connected to {}: {} Hz {} I/Q stream ({})",
                    self.endpoint(),
                    info.sample_rate,
                    info.sample_format.short_name(),
                    info.protocol
                );

                self.metrics.connects.fetch_add(1, Ordering::Relaxed);
                self.status = format!("CONNECTED {} Hz {}", info.sample_rate, info.sample_format.short_name());
                self.state = ConnectionState::Streaming;
                self.info = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                warn!("Connection to {} failed: {e}", self.endpoint());
                self.drop_socket();
                self.status = format!("DISCONNECTED ({e})");
                Err(e)
            }
        }
    }

    fn try_connect(&mut self) -> ClientResult<StreamInfo> {
        self.state = ConnectionState::Connecting;
        info!("Connecting to {}...", self.endpoint());

        let socket = self.open_socket()?;
        socket.set_read_timeout(Some(self.handshake_timeout))?;
        socket.set_nodelay(true)?;

        self.state = ConnectionState::Handshaking;

        let reader = socket.try_clone()?;
        self.socket = Some(socket);

        let (codec, info) = open_codec(self.protocol, reader, self.byte_order)?;

        // Таймаут опроса действует на тот же сокет, что и у клона
        if let Some(socket) = &self.socket {
            socket.set_read_timeout(Some(self.poll_timeout))?;
        }

        self.codec = Some(codec);
        Ok(info)
    }

    fn open_socket(&self) -> ClientResult<TcpStream> {
        let endpoint = self.endpoint();
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ClientError::connect(&endpoint, e))?
            .collect();

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.handshake_timeout) {
                Ok(s) => return Ok(s),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => ClientError::connect(endpoint, e),
            None => ClientError::connect(endpoint, "host has no addresses"),
        })
    }

    /// Читает не более одного кадра. Выборки передаются в `on_samples`,
    /// пока полезная нагрузка заимствована из буфера кодека.
    ///
    /// Любая ошибка, кроме таймаута, закрывает соединение.
    pub fn poll<F>(
        &mut self,
        now: Instant,
        on_samples: F,
    ) -> ClientResult<PollOutcome>
    where
        F: FnOnce(&SampleFrame<'_>),
    {
        let Some(codec) = self.codec.as_mut() else {
            return Ok(PollOutcome::Idle);
        };

        let result = match codec.next_frame() {
            Ok(Frame::Idle) => Ok(PollOutcome::Idle),
            Ok(Frame::Samples(frame)) => {
                on_samples(&frame);
                Ok(PollOutcome::Samples {
                    sample_count: frame.header.sample_count,
                    dropped: frame.dropped,
                })
            }
            Ok(Frame::Meta(meta)) => Ok(PollOutcome::Meta(meta)),
            Err(ProtocolError::Timeout) => Ok(PollOutcome::Idle),
            Err(e) => Err(e),
        };

        match result {
            Ok(PollOutcome::Samples {
                sample_count,
                dropped,
            }) => {
                let m = &self.metrics;
                m.frames_received.fetch_add(1, Ordering::Relaxed);
                m.samples_received
                    .fetch_add(sample_count as u64, Ordering::Relaxed);
                if let Some(n) = dropped {
                    m.dropped_frames.fetch_add(n as u64, Ordering::Relaxed);
                }
                if let Some(info) = &self.info {
                    let bytes = sample_count as u64 * info.sample_format.pair_size() as u64;
                    m.bytes_received.fetch_add(bytes, Ordering::Relaxed);
                }
                Ok(PollOutcome::Samples {
                    sample_count,
                    dropped,
                })
            }
            Ok(PollOutcome::Meta(meta)) => Ok(self.apply_meta(meta, now)),
            Ok(other) => Ok(other),
            Err(e) => {
                warn!("Connection lost: {e}");
                self.disconnect(now);
                self.status = format!("DISCONNECTED ({e})");
                Err(e.into())
            }
        }
    }

    fn apply_meta(
        &mut self,
        meta: MetaUpdate,
        now: Instant,
    ) -> PollOutcome {
        self.metrics.meta_updates.fetch_add(1, Ordering::Relaxed);

        let Some(info) = self.info.as_mut() else {
            return PollOutcome::Meta(meta);
        };

        if meta.changes_stream_format(info) {
            info!(
                "Stream parameters changed (rate={:?}, format={:?}), reconnecting",
                meta.sample_rate, meta.sample_format
            );
            self.disconnect(now);
            self.reconnect_now = true;
            return PollOutcome::StreamChanged(meta);
        }

        info!(
            "Center freq: {} Hz, Gain: {:.1} dB, LNA: {}",
            meta.center_freq,
            meta.gain_reduction as f32 / 10.0,
            meta.lna_enabled
        );
        info.apply_meta(&meta);

        PollOutcome::Meta(meta)
    }

    /// Закрывает соединение и запускает отсчёт интервала повтора.
    pub fn disconnect(
        &mut self,
        now: Instant,
    ) {
        if self.state == ConnectionState::Streaming {
            self.metrics.disconnects.fetch_add(1, Ordering::Relaxed);
            info!("Disconnected from {}", self.endpoint());
        }

        self.drop_socket();
        self.info = None;
        self.last_attempt = Some(now);
        self.status = "DISCONNECTED".to_string();
    }

    fn drop_socket(&mut self) {
        self.codec = None;
        if let Some(socket) = self.socket.take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Пора ли делать автоматическую попытку подключения.
    ///
    /// Первая попытка разрешена сразу, следующие не раньше чем через
    /// интервал повтора после последней попытки или разрыва.
    pub fn reconnect_due(
        &self,
        now: Instant,
    ) -> bool {
        if self.state != ConnectionState::Disconnected {
            return false;
        }

        if self.reconnect_now {
            return true;
        }

        match self.last_attempt {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= self.reconnect_interval,
        }
    }

    /// Следующая проверка [`Self::reconnect_due`] разрешит попытку сразу.
    pub fn request_reconnect(&mut self) {
        self.reconnect_now = true;
    }

    /// Меняет адрес источника. Текущее соединение не трогается.
    pub fn set_endpoint(
        &mut self,
        host: impl Into<String>,
        port: u16,
    ) {
        self.host = host.into();
        self.port = port;
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Streaming
    }

    /// Параметры текущего потока (только в `Streaming`).
    pub fn stream_info(&self) -> Option<&StreamInfo> {
        self.info.as_ref()
    }

    /// Строка состояния для оверлея.
    pub fn status_text(&self) -> &str {
        &self.status
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    pub fn byte_order(&self) -> ByteOrderKind {
        self.byte_order
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.drop_socket();
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{io::Write, net::TcpListener, thread};

    use iqfall_core::StreamHeaderExt;
    use iqfall_types::{SampleFormat, StreamHeader};

    use super::*;

    fn manager_for(addr: SocketAddr) -> ConnectionManager {
        let options = ClientOptions {
            handshake_timeout: Duration::from_millis(500),
            ..ClientOptions::default()
        };
        ConnectionManager::new(
            addr.ip().to_string(),
            addr.port(),
            &options,
            ClientMetrics::new(),
        )
    }

    #[test]
    fn test_initial_state() {
        let m = ConnectionManager::new("localhost", 4536, &ClientOptions::default(), ClientMetrics::new());

        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.reconnect_due(Instant::now()));
        assert_eq!(m.endpoint(), "localhost:4536");
    }

    #[test]
    fn test_refused_schedules_retry() {
        // Порт, на котором гарантированно никто не слушает
        let addr = {
            let l = TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap()
        };

        let mut m = manager_for(addr);
        let t0 = Instant::now();

        assert!(m.connect(t0).is_err());
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!m.reconnect_due(t0 + Duration::from_secs(1)));
        assert!(m.reconnect_due(t0 + Duration::from_secs(5)));
    }

    #[test]
    fn test_handshake_bad_magic() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            s.write_all(&[0xAB; 32]).unwrap();
        });

        let mut m = manager_for(addr);
        let err = m.connect(Instant::now()).unwrap_err();

        assert!(matches!(err, ClientError::Protocol(ProtocolError::BadMagic { .. })));
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(m.status_text().starts_with("DISCONNECTED"));
    }

    #[test]
    fn test_handshake_success_then_idle_poll() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut s, _) = listener.accept().unwrap();
            let header = StreamHeader::new(48_000, SampleFormat::Int16, 7_000_000);
            s.write_all(&header.encode(ByteOrderKind::Little)).unwrap();
            // Держим соединение открытым, пока клиент опрашивает
            thread::sleep(Duration::from_millis(400));
        });

        let mut m = manager_for(addr);
        let info = m.connect(Instant::now()).unwrap();

        assert_eq!(info.sample_rate, 48_000);
        assert!(m.is_connected());
        assert!(!m.reconnect_due(Instant::now()));

        let outcome = m.poll(Instant::now(), |_| panic!("no samples expected")).unwrap();
        assert_eq!(outcome, PollOutcome::Idle);

        server.join().unwrap();
    }

    #[test]
    fn test_set_endpoint() {
        let mut m = ConnectionManager::new("a", 1, &ClientOptions::default(), ClientMetrics::new());
        m.set_endpoint("192.168.1.20", 4536);

        assert_eq!(m.host(), "192.168.1.20");
        assert_eq!(m.port(), 4536);
    }
}
