//! Обнаружение источников в локальной сети.
//!
//! Узлы рассылают по UDP текстовые объявления:
//!
//! ```text
//! IQF1 HELLO <id> <service> <ctrl_port> <data_port> <caps>
//! IQF1 BYE   <id> <service> <ctrl_port> <data_port> <caps>
//! ```
//!
//! Поток-слушатель разбирает датаграммы и передаёт найденный источник в
//! главный цикл через [`DiscoveryHandoff`]: одноместный канал, в котором
//! более новое событие вытесняет необработанное старое.

use std::{
    net::{Ipv4Addr, SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, info, warn};

use crate::{ClientError, ClientResult};

/// Префикс протокола объявлений
pub const ANNOUNCE_PREFIX: &str = "IQF1";
/// Сервис, к которому подключается клиент
pub const SERVICE_SDR_SERVER: &str = "sdr_server";
/// Сервис, которым объявляет себя клиент
pub const SERVICE_WATERFALL: &str = "waterfall";
/// Возможности клиента в объявлении
pub const WATERFALL_CAPS: &str = "display";

const LISTEN_TIMEOUT: Duration = Duration::from_millis(200);
const MAX_DATAGRAM: usize = 512;

/// Тип объявления.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceKind {
    Hello,
    Bye,
}

/// Разобранное объявление узла.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub kind: AnnounceKind,
    pub id: String,
    pub service: String,
    pub ctrl_port: u16,
    pub data_port: u16,
    pub caps: String,
}

/// Источник, найденный в сети.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub id: String,
    pub host: String,
    pub data_port: u16,
}

/// Разбирает датаграмму объявления. Чужие и повреждённые сообщения
/// возвращают `None`.
pub fn parse_announcement(text: &str) -> Option<Announcement> {
    let mut parts = text.split_whitespace();

    if parts.next()? != ANNOUNCE_PREFIX {
        return None;
    }

    let kind = match parts.next()? {
        "HELLO" => AnnounceKind::Hello,
        "BYE" => AnnounceKind::Bye,
        _ => return None,
    };

    let id = parts.next()?.to_string();
    let service = parts.next()?.to_string();
    let ctrl_port = parts.next()?.parse().ok()?;
    let data_port = parts.next()?.parse().ok()?;
    let caps = parts.next().unwrap_or("").to_string();

    Some(Announcement {
        kind,
        id,
        service,
        ctrl_port,
        data_port,
        caps,
    })
}

/// Формирует текст объявления.
pub fn format_announcement(a: &Announcement) -> String {
    let kind = match a.kind {
        AnnounceKind::Hello => "HELLO",
        AnnounceKind::Bye => "BYE",
    };

    format!(
        "{ANNOUNCE_PREFIX} {kind} {} {} {} {} {}",
        a.id, a.service, a.ctrl_port, a.data_port, a.caps
    )
}

////////////////////////////////////////////////////////////////////////////////
// Передача событий в главный цикл
////////////////////////////////////////////////////////////////////////////////

/// Одноместный канал между потоком обнаружения и главным циклом.
#[derive(Clone)]
pub struct DiscoveryHandoff {
    tx: Sender<DiscoveredPeer>,
    rx: Receiver<DiscoveredPeer>,
}

impl DiscoveryHandoff {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    /// Публикует событие. Необработанное старое событие отбрасывается.
    pub fn publish(
        &self,
        peer: DiscoveredPeer,
    ) {
        let mut pending = peer;

        loop {
            match self.tx.try_send(pending) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(p)) => {
                    let _ = self.rx.try_recv();
                    pending = p;
                }
            }
        }
    }

    /// Забирает событие, если оно есть.
    pub fn take(&self) -> Option<DiscoveredPeer> {
        self.rx.try_recv().ok()
    }
}

impl Default for DiscoveryHandoff {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Реализации обнаружения
////////////////////////////////////////////////////////////////////////////////

/// Служба обнаружения источников.
pub trait Discovery {
    /// Объявляет клиента в сети и начинает слушать объявления.
    fn start(&mut self) -> ClientResult<()>;

    /// Последний найденный источник, если он ещё не обработан.
    fn take_discovered(&mut self) -> Option<DiscoveredPeer>;

    /// Прощается с сетью и останавливает слушатель.
    fn shutdown(&mut self);
}

/// Обнаружение отключено.
#[derive(Debug, Default)]
pub struct NullDiscovery;

impl Discovery for NullDiscovery {
    fn start(&mut self) -> ClientResult<()> {
        Ok(())
    }

    fn take_discovered(&mut self) -> Option<DiscoveredPeer> {
        None
    }

    fn shutdown(&mut self) {}
}

/// Обнаружение через широковещательные UDP датаграммы.
pub struct UdpDiscovery {
    node_id: String,
    port: u16,
    broadcast: SocketAddr,
    socket: Option<UdpSocket>,
    handoff: DiscoveryHandoff,
    stop_flag: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
}

impl UdpDiscovery {
    pub fn new(
        node_id: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            port,
            broadcast: SocketAddr::from((Ipv4Addr::BROADCAST, port)),
            socket: None,
            handoff: DiscoveryHandoff::new(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }

    /// Адрес, на который рассылаются объявления (в тестах: loopback).
    pub fn with_broadcast_addr(
        mut self,
        addr: SocketAddr,
    ) -> Self {
        self.broadcast = addr;
        self
    }

    /// Порт, на котором фактически слушает сокет.
    pub fn local_port(&self) -> Option<u16> {
        self.socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map(|a| a.port())
    }

    pub fn handoff(&self) -> DiscoveryHandoff {
        self.handoff.clone()
    }

    fn announcement(
        &self,
        kind: AnnounceKind,
    ) -> Announcement {
        Announcement {
            kind,
            id: self.node_id.clone(),
            service: SERVICE_WATERFALL.to_string(),
            ctrl_port: 0,
            data_port: 0,
            caps: WATERFALL_CAPS.to_string(),
        }
    }

    fn announce(
        &self,
        kind: AnnounceKind,
    ) {
        let Some(socket) = &self.socket else {
            return;
        };

        let text = format_announcement(&self.announcement(kind));
        if let Err(e) = socket.send_to(text.as_bytes(), self.broadcast) {
            warn!("Discovery announce to {} failed: {e}", self.broadcast);
        }
    }
}

impl Discovery for UdpDiscovery {
    fn start(&mut self) -> ClientResult<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, self.port))
            .map_err(|e| ClientError::Discovery(format!("bind UDP port {}: {e}", self.port)))?;
        socket.set_broadcast(true)?;
        socket.set_read_timeout(Some(LISTEN_TIMEOUT))?;

        let listen = socket.try_clone()?;
        self.socket = Some(socket);

        let handoff = self.handoff.clone();
        let stop_flag = self.stop_flag.clone();
        let own_id = self.node_id.clone();

        self.listener = Some(thread::spawn(move || {
            listen_loop(listen, handoff, stop_flag, own_id);
        }));

        self.announce(AnnounceKind::Hello);
        info!("Discovery: announcing as {} on UDP port {}", self.node_id, self.port);

        Ok(())
    }

    fn take_discovered(&mut self) -> Option<DiscoveredPeer> {
        self.handoff.take()
    }

    fn shutdown(&mut self) {
        if self.socket.is_none() {
            return;
        }

        self.announce(AnnounceKind::Bye);
        self.stop_flag.store(true, Ordering::Relaxed);

        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
        self.socket = None;
    }
}

impl Drop for UdpDiscovery {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn listen_loop(
    socket: UdpSocket,
    handoff: DiscoveryHandoff,
    stop_flag: Arc<AtomicBool>,
    own_id: String,
) {
    let mut buf = [0u8; MAX_DATAGRAM];

    while !stop_flag.load(Ordering::Relaxed) {
        let (n, from) = match socket.recv_from(&mut buf) {
            Ok(r) => r,
            Err(e) if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
                continue
            }
            Err(e) => {
                warn!("Discovery listener stopped: {e}");
                return;
            }
        };

        let Ok(text) = std::str::from_utf8(&buf[..n]) else {
            continue;
        };
        let Some(a) = parse_announcement(text) else {
            debug!("Ignoring datagram from {from}");
            continue;
        };

        if a.id == own_id || a.service != SERVICE_SDR_SERVER {
            continue;
        }

        match a.kind {
            AnnounceKind::Hello => {
                info!("Discovered {} '{}' at {}:{}", a.service, a.id, from.ip(), a.data_port);
                handoff.publish(DiscoveredPeer {
                    id: a.id,
                    host: from.ip().to_string(),
                    data_port: a.data_port,
                });
            }
            AnnounceKind::Bye => {
                info!("Service left: {} '{}'", a.service, a.id);
            }
        }
    }
}
