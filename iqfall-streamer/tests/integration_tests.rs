use std::{
    net::{SocketAddr, TcpStream},
    sync::{atomic::Ordering, Arc},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use iqfall_core::{open_codec, Frame, StreamCodec};
use iqfall_streamer::{StreamSession, StreamerConfig, StreamerMetrics, StreamerResult};
use iqfall_types::{ByteOrderKind, ProtocolError, ProtocolKind, SampleFormat, StreamInfo};

type Running = (SocketAddr, Arc<StreamerMetrics>, JoinHandle<StreamerResult<()>>);

fn start(config: StreamerConfig) -> Running {
    let session = StreamSession::bind(StreamerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..config
    })
    .unwrap();

    let addr = session.local_addr().unwrap();
    let metrics = session.metrics();
    let handle = thread::spawn(move || session.run());

    (addr, metrics, handle)
}

fn connect(
    addr: SocketAddr,
    order: ByteOrderKind,
) -> (Box<dyn StreamCodec>, StreamInfo) {
    let sock = TcpStream::connect(addr).unwrap();
    sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    open_codec(ProtocolKind::Auto, sock, order).unwrap()
}

/// Читает кадры до закрытия соединения. Возвращает номера кадров.
fn drain(codec: &mut dyn StreamCodec) -> (Vec<u32>, ProtocolError) {
    let mut sequences = Vec::new();

    loop {
        match codec.next_frame() {
            Ok(Frame::Samples(f)) => sequences.push(f.header.sequence),
            Ok(Frame::Meta(_)) => {}
            Ok(Frame::Idle) => panic!("stream stalled after {sequences:?}"),
            Err(e) => return (sequences, e),
        }
    }
}

#[test]
fn test_serves_ft32_over_tcp() {
    let (addr, metrics, handle) = start(StreamerConfig {
        protocol: ProtocolKind::Ft32,
        sample_format: SampleFormat::Float32,
        sample_rate: 48_000,
        frame_samples: 256,
        max_frames: Some(5),
        max_clients: Some(1),
        realtime: false,
        ..StreamerConfig::default()
    });

    let (mut codec, info) = connect(addr, ByteOrderKind::Little);

    assert_eq!(info.protocol, ProtocolKind::Ft32);
    assert_eq!(info.sample_rate, 48_000);
    assert_eq!(info.sample_format, SampleFormat::Float32);

    let (sequences, end) = drain(codec.as_mut());

    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
    assert!(matches!(end, ProtocolError::ConnectionClosed), "{end}");

    handle.join().unwrap().unwrap();
    assert_eq!(metrics.clients_served.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.samples_sent.load(Ordering::Relaxed), 5 * 256);
}

#[test]
fn test_close_after_serves_next_client() {
    let (addr, metrics, handle) = start(StreamerConfig {
        sample_format: SampleFormat::UInt8,
        byte_order: ByteOrderKind::Big,
        frame_samples: 128,
        close_after: Some(2),
        max_clients: Some(2),
        realtime: false,
        ..StreamerConfig::default()
    });

    for _ in 0..2 {
        let (mut codec, info) = connect(addr, ByteOrderKind::Big);
        assert_eq!(info.sample_format, SampleFormat::UInt8);

        let (sequences, end) = drain(codec.as_mut());

        assert_eq!(sequences, vec![0, 1]);
        assert!(matches!(end, ProtocolError::ConnectionClosed), "{end}");
    }

    handle.join().unwrap().unwrap();
    assert_eq!(metrics.clients_served.load(Ordering::Relaxed), 2);
}

#[test]
fn test_sequence_skip_reaches_client() {
    let (addr, _metrics, handle) = start(StreamerConfig {
        frame_samples: 64,
        max_frames: Some(4),
        skip_sequence_at: Some(1),
        meta_every: Some(2),
        max_clients: Some(1),
        realtime: false,
        ..StreamerConfig::default()
    });

    let (mut codec, _) = connect(addr, ByteOrderKind::Little);
    let (sequences, _) = drain(codec.as_mut());

    assert_eq!(sequences, vec![0, 2, 3, 4]);
    assert_eq!(codec.stats().gaps, 1);
    assert_eq!(codec.stats().meta_frames, 1);

    handle.join().unwrap().unwrap();
}

#[test]
fn test_realtime_pacing() {
    // 1200 пар при 12 кГц: 100 мс на кадр
    let (addr, metrics, handle) = start(StreamerConfig {
        sample_rate: 12_000,
        frame_samples: 1_200,
        max_frames: Some(4),
        max_clients: Some(1),
        ..StreamerConfig::default()
    });

    let (mut codec, _) = connect(addr, ByteOrderKind::Little);
    let begin = Instant::now();
    let (sequences, _) = drain(codec.as_mut());
    let elapsed = begin.elapsed();

    assert_eq!(sequences.len(), 4);
    assert!(
        elapsed >= Duration::from_millis(250),
        "4 frames arrived in {}ms",
        elapsed.as_millis()
    );

    handle.join().unwrap().unwrap();
    assert_eq!(metrics.frames_sent.load(Ordering::Relaxed), 4);
}

#[test]
fn test_stop_flag_ends_idle_server() {
    let session = StreamSession::bind(StreamerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..StreamerConfig::default()
    })
    .unwrap();

    let stop = session.stop_flag();
    let handle = thread::spawn(move || session.run());

    thread::sleep(Duration::from_millis(50));
    stop.store(true, Ordering::Relaxed);

    handle.join().unwrap().unwrap();
}
