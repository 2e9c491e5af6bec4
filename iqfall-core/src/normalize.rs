//! Преобразование сырых выборок в f32 и обратно.
//!
//! Int16 делится на 32768, UInt8 центрируется вокруг 127.5, Float32 по
//! соглашению источника уже нормирован и передаётся как есть.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use iqfall_types::{ByteOrderKind, SampleFormat};

const INT16_SCALE: f32 = 32_768.0;
const UINT8_CENTER: f32 = 127.5;

/// Нормирует полезную нагрузку кадра в чередующиеся I/Q значения f32.
///
/// `out` переиспользуется между кадрами; неполная хвостовая компонента
/// отбрасывается.
pub fn normalize_into(
    format: SampleFormat,
    order: ByteOrderKind,
    raw: &[u8],
    out: &mut Vec<f32>,
) {
    let bps = format.bytes_per_sample();
    let n = raw.len() / bps;
    let raw = &raw[..n * bps];

    out.clear();
    out.resize(n, 0.0);

    match format {
        SampleFormat::Int16 => {
            for (dst, b) in out.iter_mut().zip(raw.chunks_exact(2)) {
                let v = match order {
                    ByteOrderKind::Little => LittleEndian::read_i16(b),
                    ByteOrderKind::Big => BigEndian::read_i16(b),
                };
                *dst = v as f32 / INT16_SCALE;
            }
        }
        SampleFormat::UInt8 => {
            for (dst, &b) in out.iter_mut().zip(raw) {
                *dst = (b as f32 - UINT8_CENTER) / UINT8_CENTER;
            }
        }
        SampleFormat::Float32 => match order {
            ByteOrderKind::Little => LittleEndian::read_f32_into(raw, out),
            ByteOrderKind::Big => BigEndian::read_f32_into(raw, out),
        },
    }
}

/// Кодирует нормированные значения в формат источника (для тестового
/// источника и тестов). Значения вне [-1, 1] насыщаются.
pub fn encode_samples(
    format: SampleFormat,
    order: ByteOrderKind,
    samples: &[f32],
    out: &mut Vec<u8>,
) {
    out.clear();
    out.reserve(samples.len() * format.bytes_per_sample());

    for &x in samples {
        match format {
            SampleFormat::Int16 => {
                let v = (x * INT16_SCALE).round().clamp(-32_768.0, 32_767.0) as i16;
                let b = match order {
                    ByteOrderKind::Little => v.to_le_bytes(),
                    ByteOrderKind::Big => v.to_be_bytes(),
                };
                out.extend_from_slice(&b);
            }
            SampleFormat::UInt8 => {
                let v = (x * UINT8_CENTER + UINT8_CENTER).round().clamp(0.0, 255.0) as u8;
                out.push(v);
            }
            SampleFormat::Float32 => {
                let b = match order {
                    ByteOrderKind::Little => x.to_le_bytes(),
                    ByteOrderKind::Big => x.to_be_bytes(),
                };
                out.extend_from_slice(&b);
            }
        }
    }
}

/// Допустимая ошибка квантования формата (половина шага).
pub fn quantization_step(format: SampleFormat) -> f32 {
    match format {
        SampleFormat::Int16 => 1.0 / INT16_SCALE,
        SampleFormat::UInt8 => 1.0 / UINT8_CENTER,
        SampleFormat::Float32 => 0.0,
    }
}
