use std::{
    io::Write,
    net::{TcpListener, TcpStream},
    thread,
    time::Duration,
};

use iqfall_core::{
    encode_ft32_header, encode_samples, normalize_into, open_codec, quantization_step,
    DataFrameHeaderExt, Frame, MetaUpdateExt, StreamHeaderExt, MAGIC_DATA, MAGIC_IQDQ,
};
use iqfall_types::{
    ByteOrderKind, DataFrameHeader, MetaUpdate, ProtocolError, ProtocolKind, SampleFormat,
    StreamHeader,
};

// ===========================================================================
// Helpers
// ===========================================================================

/// Поднимает одноразовый сервер, который отправляет `bytes` и закрывает
/// соединение. Возвращает подключённый клиентский сокет.
fn serve_once(bytes: Vec<u8>) -> TcpStream {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (mut sock, _) = listener.accept().unwrap();
        // Отправляем мелкими кусками, чтобы проверить склейку коротких чтений
        for chunk in bytes.chunks(7) {
            sock.write_all(chunk).unwrap();
        }
    });

    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

/// Детерминированная пилообразная последовательность в [-0.9, 0.9].
fn ramp(n: usize) -> Vec<f32> {
    (0..n).map(|k| ((k % 37) as f32 / 36.0) * 1.8 - 0.9).collect()
}

fn phxi_stream(
    format: SampleFormat,
    order: ByteOrderKind,
    frames: &[(u32, Vec<f32>)],
) -> Vec<u8> {
    let mut raw = StreamHeader::new(2_000_000, format, 100_000_000)
        .encode(order)
        .to_vec();

    for (seq, values) in frames {
        let header = DataFrameHeader::new(*seq, (values.len() / 2) as u32);
        raw.extend_from_slice(&header.encode(MAGIC_IQDQ, order));

        let mut payload = Vec::new();
        encode_samples(format, order, values, &mut payload);
        raw.extend_from_slice(&payload);
    }

    raw
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_phxi_all_formats_over_tcp() {
    for format in [SampleFormat::Int16, SampleFormat::Float32, SampleFormat::UInt8] {
        for order in [ByteOrderKind::Little, ByteOrderKind::Big] {
            let values = ramp(512);
            let raw = phxi_stream(format, order, &[(0, values.clone()), (1, values.clone())]);

            let (mut codec, info) = open_codec(ProtocolKind::Phxi, serve_once(raw), order).unwrap();
            assert_eq!(info.sample_format, format);
            assert_eq!(info.sample_rate, 2_000_000);

            let tol = quantization_step(format);
            let mut out = Vec::new();

            for expected_seq in 0..2 {
                match codec.next_frame().unwrap() {
                    Frame::Samples(frame) => {
                        assert_eq!(frame.header.sequence, expected_seq);
                        assert_eq!(frame.header.sample_count, 256);
                        normalize_into(frame.format, order, frame.payload, &mut out);
                    }
                    other => panic!("{format}/{order}: unexpected {other:?}"),
                }

                assert_eq!(out.len(), values.len());
                for (a, b) in values.iter().zip(&out) {
                    assert!((a - b).abs() <= tol, "{format}/{order}: {a} vs {b}");
                }
            }

            assert!(matches!(
                codec.next_frame(),
                Err(ProtocolError::ConnectionClosed)
            ));
            assert_eq!(codec.stats().frames_ok, 2);
        }
    }
}

#[test]
fn test_ft32_over_tcp_auto() {
    let order = ByteOrderKind::Little;
    let values = ramp(64);

    let mut raw = encode_ft32_header(12_000, order).to_vec();
    raw.extend_from_slice(&DataFrameHeader::new(9, 32).encode(MAGIC_DATA, order));
    let mut payload = Vec::new();
    encode_samples(SampleFormat::Float32, order, &values, &mut payload);
    raw.extend_from_slice(&payload);

    let (mut codec, info) = open_codec(ProtocolKind::Auto, serve_once(raw), order).unwrap();
    assert_eq!(codec.kind(), ProtocolKind::Ft32);
    assert_eq!(info.sample_rate, 12_000);

    let mut out = Vec::new();
    match codec.next_frame().unwrap() {
        Frame::Samples(frame) => normalize_into(frame.format, order, frame.payload, &mut out),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(out, values);
}

#[test]
fn test_sequence_gap_continues_stream() {
    let order = ByteOrderKind::Little;
    let v = ramp(8);
    let raw = phxi_stream(
        SampleFormat::Int16,
        order,
        &[(5, v.clone()), (6, v.clone()), (8, v.clone()), (9, v)],
    );

    let (mut codec, _) = open_codec(ProtocolKind::Phxi, serve_once(raw), order).unwrap();

    let mut gaps = Vec::new();
    for _ in 0..4 {
        match codec.next_frame().unwrap() {
            Frame::Samples(frame) => gaps.push(frame.dropped),
            other => panic!("unexpected {other:?}"),
        }
    }

    assert_eq!(gaps, vec![None, None, Some(1), None]);
    assert_eq!(codec.stats().gaps, 1);
}

#[test]
fn test_meta_between_frames() {
    let order = ByteOrderKind::Big;
    let mut raw = phxi_stream(SampleFormat::Float32, order, &[(0, ramp(4))]);

    let meta = MetaUpdate {
        sequence: 1,
        center_freq: 433_920_000,
        gain_reduction: 0,
        lna_enabled: true,
        sample_rate: None,
        sample_format: None,
    };
    raw.extend_from_slice(&meta.encode(order));

    let (mut codec, _) = open_codec(ProtocolKind::Auto, serve_once(raw), order).unwrap();

    assert!(matches!(codec.next_frame().unwrap(), Frame::Samples(_)));
    match codec.next_frame().unwrap() {
        Frame::Meta(m) => assert_eq!(m.center_freq, 433_920_000),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_unknown_frame_type_is_fatal() {
    let order = ByteOrderKind::Little;
    let mut raw = phxi_stream(SampleFormat::Float32, order, &[]);
    raw.extend_from_slice(&DataFrameHeader::new(0, 4).encode(0x5858_5858, order));
    raw.extend_from_slice(&[0u8; 32]);

    let (mut codec, _) = open_codec(ProtocolKind::Phxi, serve_once(raw), order).unwrap();

    let err = codec.next_frame().unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownFrameType(0x5858_5858)));
    assert!(err.is_fatal());
}

#[test]
fn test_wrong_protocol_is_bad_magic() {
    let mut raw = encode_ft32_header(12_000, ByteOrderKind::Little).to_vec();
    raw.extend_from_slice(&DataFrameHeader::new(0, 0).encode(MAGIC_DATA, ByteOrderKind::Little));

    let result = open_codec(
        ProtocolKind::Phxi,
        serve_once(raw),
        ByteOrderKind::Little,
    );

    assert!(matches!(result, Err(ProtocolError::BadMagic { .. })));
}
