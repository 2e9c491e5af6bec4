//! Потоковая обработка I/Q для водопада.
//!
//! Цепочка: нормированные выборки → [`IqDecimator`] → [`IqRing`] →
//! [`SpectralAnalyzer`] → [`GainState`] → [`WaterfallBuffer`]. Всё
//! состояние собрано в [`WaterfallPipeline`]; после создания горячий путь
//! не выделяет память.

use iqfall_types::ResourceError;

pub mod accumulator;
pub mod agc;
pub mod analyzer;
pub mod compositor;
pub mod decimator;
pub mod palette;
pub mod pipeline;
pub mod window;

pub use accumulator::*;
pub use agc::*;
pub use analyzer::*;
pub use compositor::*;
pub use decimator::*;
pub use palette::*;
pub use pipeline::*;
pub use window::*;

/// Частота дискретизации, на которой строится спектр, Гц.
pub const DISPLAY_SAMPLE_RATE: u32 = 12_000;
/// Размер БПФ и ёмкость кольцевого буфера.
pub const FFT_SIZE: usize = 2048;
/// Сколько новых выборок нужно для следующей строки (перекрытие 50 %).
pub const UPDATE_THRESHOLD: usize = FFT_SIZE / 2;
/// Половина видимой полосы, Гц.
pub const ZOOM_MAX_HZ: f32 = 5_000.0;

const DB_EPSILON: f32 = 1e-10;

/// Амплитуда в дБ: `20·log10(mag + 1e-10)`.
#[inline]
pub fn magnitude_db(mag: f32) -> f32 {
    20.0 * (mag + DB_EPSILON).log10()
}

/// Выделяет вектор заданной длины, сообщая об ошибке вместо аварийного
/// завершения.
pub(crate) fn try_alloc<T: Clone>(
    what: &'static str,
    len: usize,
    value: T,
) -> Result<Vec<T>, ResourceError> {
    let mut v = Vec::new();

    v.try_reserve_exact(len)
        .map_err(|_| ResourceError::AllocationFailed {
            what,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    v.resize(len, value);

    Ok(v)
}
