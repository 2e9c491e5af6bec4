//! Раскладка кадров wire-протокола.
//!
//! Все структуры упакованы без выравнивания. Порядок байт задаётся
//! [`ByteOrderKind`] и одинаков для всех полей, включая магические числа.
//!
//! ```text
//! PHXI header (32): magic version sample_rate sample_format
//!                   center_freq_lo center_freq_hi gain_reduction lna_state
//! IQDQ frame  (16): magic sequence num_samples flags   + I/Q пары
//! META frame  (32): magic sequence center_freq_lo center_freq_hi
//!                   gain_reduction lna_state reserved[2]
//! FT32 header (16): magic sample_rate reserved[2]
//! DATA frame  (16): magic sequence num_samples reserved + F32 I/Q пары
//! ```

use std::io::Cursor;

use log::warn;

use iqfall_types::{
    ByteOrderKind, DataFrameHeader, MetaUpdate, ProtocolError, ProtocolResult, SampleFormat,
    StreamHeader,
};

use crate::binary::{
    read_i32_ordered, read_u32_ordered, read_u64_split, write_i32_ordered, write_u32_ordered,
    write_u64_split,
};

/// "PHXI": заголовок потока
pub const MAGIC_PHXI: u32 = 0x5048_5849;
/// "IQDQ": кадр с выборками
pub const MAGIC_IQDQ: u32 = 0x4951_4451;
/// "META": кадр обновления параметров
pub const MAGIC_META: u32 = 0x4D45_5441;
/// "FT32": заголовок упрощённого потока
pub const MAGIC_FT32: u32 = 0x4654_3332;
/// "DATA": кадр упрощённого потока
pub const MAGIC_DATA: u32 = 0x4441_5441;

/// Текущая версия PHXI протокола
pub const PHXI_VERSION: u32 = 1;

pub const MAGIC_SIZE: usize = 4;
pub const PHXI_HEADER_SIZE: usize = 32;
pub const FT32_HEADER_SIZE: usize = 16;
pub const FRAME_HEADER_SIZE: usize = 16;
pub const META_FRAME_SIZE: usize = 32;

/// Верхняя граница `num_samples` в одном кадре (защита от мусора в потоке)
pub const MAX_FRAME_SAMPLES: u32 = 1 << 20;

/// Сериализация PHXI заголовка.
pub trait StreamHeaderExt: Sized {
    fn encode(
        &self,
        order: ByteOrderKind,
    ) -> [u8; PHXI_HEADER_SIZE];

    fn decode(
        buf: &[u8; PHXI_HEADER_SIZE],
        order: ByteOrderKind,
    ) -> ProtocolResult<Self>;
}

/// Сериализация заголовка кадра (IQDQ и DATA имеют одинаковую раскладку).
pub trait DataFrameHeaderExt: Sized {
    fn encode(
        &self,
        magic: u32,
        order: ByteOrderKind,
    ) -> [u8; FRAME_HEADER_SIZE];

    /// Разбирает заголовок без проверки магического числа.
    fn decode(
        buf: &[u8; FRAME_HEADER_SIZE],
        order: ByteOrderKind,
    ) -> Self;
}

/// Сериализация META кадра.
pub trait MetaUpdateExt: Sized {
    fn encode(
        &self,
        order: ByteOrderKind,
    ) -> [u8; META_FRAME_SIZE];

    fn decode(
        buf: &[u8; META_FRAME_SIZE],
        order: ByteOrderKind,
    ) -> ProtocolResult<Self>;
}

impl StreamHeaderExt for StreamHeader {
    fn encode(
        &self,
        order: ByteOrderKind,
    ) -> [u8; PHXI_HEADER_SIZE] {
        let mut buf = Vec::with_capacity(PHXI_HEADER_SIZE);

        write_u32_ordered(&mut buf, order, MAGIC_PHXI);
        write_u32_ordered(&mut buf, order, self.version);
        write_u32_ordered(&mut buf, order, self.sample_rate);
        write_u32_ordered(&mut buf, order, self.sample_format.as_u32());
        write_u64_split(&mut buf, order, self.center_freq);
        write_i32_ordered(&mut buf, order, self.gain_reduction);
        write_u32_ordered(&mut buf, order, self.lna_enabled as u32);

        to_array(&buf)
    }

    fn decode(
        buf: &[u8; PHXI_HEADER_SIZE],
        order: ByteOrderKind,
    ) -> ProtocolResult<Self> {
        let mut cur = Cursor::new(&buf[..]);

        let magic = read_u32_ordered(&mut cur, order)?;
        if magic != MAGIC_PHXI {
            return Err(ProtocolError::bad_magic(MAGIC_PHXI, magic));
        }

        let version = read_u32_ordered(&mut cur, order)?;
        let sample_rate = read_u32_ordered(&mut cur, order)?;
        let sample_format = SampleFormat::from_u32(read_u32_ordered(&mut cur, order)?)?;
        let center_freq = read_u64_split(&mut cur, order)?;
        let gain_reduction = read_i32_ordered(&mut cur, order)?;
        let lna_enabled = read_u32_ordered(&mut cur, order)? != 0;

        Ok(StreamHeader {
            version,
            sample_rate,
            sample_format,
            center_freq,
            gain_reduction,
            lna_enabled,
        })
    }
}

impl DataFrameHeaderExt for DataFrameHeader {
    fn encode(
        &self,
        magic: u32,
        order: ByteOrderKind,
    ) -> [u8; FRAME_HEADER_SIZE] {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE);

        write_u32_ordered(&mut buf, order, magic);
        write_u32_ordered(&mut buf, order, self.sequence);
        write_u32_ordered(&mut buf, order, self.sample_count);
        write_u32_ordered(&mut buf, order, self.flags);

        to_array(&buf)
    }

    fn decode(
        buf: &[u8; FRAME_HEADER_SIZE],
        order: ByteOrderKind,
    ) -> Self {
        DataFrameHeader {
            sequence: word_at(buf, 1, order),
            sample_count: word_at(buf, 2, order),
            flags: word_at(buf, 3, order),
        }
    }
}

impl MetaUpdateExt for MetaUpdate {
    fn encode(
        &self,
        order: ByteOrderKind,
    ) -> [u8; META_FRAME_SIZE] {
        let mut buf = Vec::with_capacity(META_FRAME_SIZE);

        write_u32_ordered(&mut buf, order, MAGIC_META);
        write_u32_ordered(&mut buf, order, self.sequence);
        write_u64_split(&mut buf, order, self.center_freq);
        write_i32_ordered(&mut buf, order, self.gain_reduction);
        write_u32_ordered(&mut buf, order, self.lna_enabled as u32);
        write_u32_ordered(&mut buf, order, self.sample_rate.unwrap_or(0));
        write_u32_ordered(
            &mut buf,
            order,
            self.sample_format.map(|f| f.as_u32()).unwrap_or(0),
        );

        to_array(&buf)
    }

    fn decode(
        buf: &[u8; META_FRAME_SIZE],
        order: ByteOrderKind,
    ) -> ProtocolResult<Self> {
        let mut cur = Cursor::new(&buf[..]);

        let magic = read_u32_ordered(&mut cur, order)?;
        if magic != MAGIC_META {
            return Err(ProtocolError::bad_magic(MAGIC_META, magic));
        }

        let sequence = read_u32_ordered(&mut cur, order)?;
        let center_freq = read_u64_split(&mut cur, order)?;
        let gain_reduction = read_i32_ordered(&mut cur, order)?;
        let lna_enabled = read_u32_ordered(&mut cur, order)? != 0;

        // Зарезервированные слова: 0 = без изменений
        let sample_rate = match read_u32_ordered(&mut cur, order)? {
            0 => None,
            r => Some(r),
        };
        let sample_format = match read_u32_ordered(&mut cur, order)? {
            0 => None,
            f => match SampleFormat::from_u32(f) {
                Ok(fmt) => Some(fmt),
                Err(_) => {
                    warn!("META #{sequence}: unknown sample format {f}, ignored");
                    None
                }
            },
        };

        Ok(MetaUpdate {
            sequence,
            center_freq,
            gain_reduction,
            lna_enabled,
            sample_rate,
            sample_format,
        })
    }
}

/// Сериализует FT32 заголовок.
pub fn encode_ft32_header(
    sample_rate: u32,
    order: ByteOrderKind,
) -> [u8; FT32_HEADER_SIZE] {
    let mut buf = Vec::with_capacity(FT32_HEADER_SIZE);

    write_u32_ordered(&mut buf, order, MAGIC_FT32);
    write_u32_ordered(&mut buf, order, sample_rate);
    write_u32_ordered(&mut buf, order, 0);
    write_u32_ordered(&mut buf, order, 0);

    to_array(&buf)
}

/// Разбирает FT32 заголовок, возвращает частоту дискретизации.
pub fn decode_ft32_header(
    buf: &[u8; FT32_HEADER_SIZE],
    order: ByteOrderKind,
) -> ProtocolResult<u32> {
    let magic = word_at(buf, 0, order);

    if magic != MAGIC_FT32 {
        return Err(ProtocolError::bad_magic(MAGIC_FT32, magic));
    }

    Ok(word_at(buf, 1, order))
}

/// Магическое число из первых четырёх байт буфера.
pub fn magic_of(
    buf: &[u8],
    order: ByteOrderKind,
) -> u32 {
    word_at(buf, 0, order)
}

/// Человекочитаемое представление магического числа ("PHXI").
pub fn magic_tag(magic: u32) -> String {
    magic
        .to_be_bytes()
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

fn word_at(
    buf: &[u8],
    index: usize,
    order: ByteOrderKind,
) -> u32 {
    let off = index * 4;
    let b = [buf[off], buf[off + 1], buf[off + 2], buf[off + 3]];

    match order {
        ByteOrderKind::Little => u32::from_le_bytes(b),
        ByteOrderKind::Big => u32::from_be_bytes(b),
    }
}

fn to_array<const N: usize>(buf: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_header_round_trip() {
        let mut h = StreamHeader::new(2_000_000, SampleFormat::Int16, 7_850_000_000);
        h.gain_reduction = 250;
        h.lna_enabled = true;

        for order in [ByteOrderKind::Little, ByteOrderKind::Big] {
            let buf = h.encode(order);
            let back = StreamHeader::decode(&buf, order).unwrap();
            assert_eq!(back, h);
        }
    }

    #[test]
    fn test_stream_header_bad_magic() {
        let h = StreamHeader::new(12_000, SampleFormat::Float32, 0);
        let mut buf = h.encode(ByteOrderKind::Little);
        buf[0] ^= 0xFF;

        let err = StreamHeader::decode(&buf, ByteOrderKind::Little).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::BadMagic {
                expected: MAGIC_PHXI,
                ..
            }
        ));
    }

    #[test]
    fn test_stream_header_wrong_byte_order_is_bad_magic() {
        let h = StreamHeader::new(12_000, SampleFormat::Float32, 0);
        let buf = h.encode(ByteOrderKind::Big);

        assert!(StreamHeader::decode(&buf, ByteOrderKind::Little).is_err());
    }

    #[test]
    fn test_stream_header_unknown_format() {
        let h = StreamHeader::new(12_000, SampleFormat::Float32, 0);
        let mut buf = h.encode(ByteOrderKind::Little);
        buf[12..16].copy_from_slice(&9u32.to_le_bytes());

        assert!(matches!(
            StreamHeader::decode(&buf, ByteOrderKind::Little),
            Err(ProtocolError::UnsupportedFormat(9))
        ));
    }

    #[test]
    fn test_frame_header_layout() {
        let h = DataFrameHeader::new(42, 1024);
        let buf = h.encode(MAGIC_IQDQ, ByteOrderKind::Little);

        assert_eq!(&buf[0..4], b"QDQI");
        assert_eq!(magic_of(&buf, ByteOrderKind::Little), MAGIC_IQDQ);
        assert_eq!(DataFrameHeader::decode(&buf, ByteOrderKind::Little), h);
    }

    #[test]
    fn test_meta_round_trip_with_reserved() {
        let meta = MetaUpdate {
            sequence: 3,
            center_freq: 0x1_0000_0001,
            gain_reduction: -40,
            lna_enabled: false,
            sample_rate: Some(48_000),
            sample_format: Some(SampleFormat::UInt8),
        };

        let buf = meta.encode(ByteOrderKind::Big);
        assert_eq!(MetaUpdate::decode(&buf, ByteOrderKind::Big).unwrap(), meta);
    }

    #[test]
    fn test_ft32_header() {
        let buf = encode_ft32_header(12_000, ByteOrderKind::Little);

        assert_eq!(decode_ft32_header(&buf, ByteOrderKind::Little).unwrap(), 12_000);
        assert!(decode_ft32_header(&[0u8; 16], ByteOrderKind::Little).is_err());
    }

    #[test]
    fn test_magic_tag() {
        assert_eq!(magic_tag(MAGIC_PHXI), "PHXI");
        assert_eq!(magic_tag(MAGIC_DATA), "DATA");
        assert_eq!(magic_tag(0x0000_4142), "..AB");
    }
}
