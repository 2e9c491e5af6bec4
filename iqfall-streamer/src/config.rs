use iqfall_core::MAX_FRAME_SAMPLES;
use iqfall_types::{ByteOrderKind, ProtocolKind, SampleFormat};

use crate::{StreamerError, StreamerResult};

/// TCP порт источника по умолчанию
pub const DEFAULT_STREAM_PORT: u16 = 4536;

/// Параметры тестового источника.
#[derive(Debug, Clone)]
pub struct StreamerConfig {
    /// Адрес прослушивания
    pub bind_addr: String,
    /// Вариант протокола (только `Phxi` или `Ft32`)
    pub protocol: ProtocolKind,
    pub byte_order: ByteOrderKind,
    /// Частота дискретизации в Гц
    pub sample_rate: u32,
    /// Формат выборок (FT32 всегда Float32)
    pub sample_format: SampleFormat,
    /// Несущая частота в Гц (заголовок и META)
    pub center_freq: u64,
    /// Ослабление усиления в десятых долях дБ
    pub gain_reduction: i32,
    /// Смещение тона относительно несущей, Гц (может быть отрицательным)
    pub tone_hz: f64,
    /// Амплитуда тона в нормированных единицах
    pub amplitude: f32,
    /// Амплитуда равномерного шума
    pub noise: f32,
    /// IQ пар в одном кадре
    pub frame_samples: u32,
    /// Сколько кадров отдать клиенту (None: бесконечно)
    pub max_frames: Option<u64>,
    /// Выдерживать темп реального времени
    pub realtime: bool,
    /// Множитель скорости при `realtime`
    pub speed: f64,
    /// META кадр перед каждым N-м кадром (только PHXI)
    pub meta_every: Option<u64>,
    /// Перед кадром с этим индексом пропустить один номер
    pub skip_sequence_at: Option<u64>,
    /// Закрыть соединение после N кадров
    pub close_after: Option<u64>,
    /// Сколько клиентов обслужить до выхода (None: без ограничения)
    pub max_clients: Option<u64>,
    pub stats_interval_secs: u64,
    /// Зерно генератора шума
    pub seed: u64,
}

impl StreamerConfig {
    fn new() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{DEFAULT_STREAM_PORT}"),
            protocol: ProtocolKind::Phxi,
            byte_order: ByteOrderKind::Little,
            sample_rate: 2_000_000,
            sample_format: SampleFormat::Int16,
            center_freq: 100_000_000,
            gain_reduction: 0,
            tone_hz: 1_000.0,
            amplitude: 0.5,
            noise: 0.0,
            frame_samples: 16_384,
            max_frames: None,
            realtime: true,
            speed: 1.0,
            meta_every: None,
            skip_sequence_at: None,
            close_after: None,
            max_clients: None,
            stats_interval_secs: 5,
            seed: 0x1F_A11,
        }
    }

    /// Проверяет согласованность параметров.
    pub fn validate(&self) -> StreamerResult<()> {
        match self.protocol {
            ProtocolKind::Auto => {
                return Err(StreamerError::Config(
                    "protocol must be phxi or ft32".to_string(),
                ));
            }
            ProtocolKind::Ft32 if self.sample_format != SampleFormat::Float32 => {
                return Err(StreamerError::Config(format!(
                    "FT32 carries Float32 only, got {}",
                    self.sample_format
                )));
            }
            _ => {}
        }

        if self.sample_rate == 0 {
            return Err(StreamerError::Config("sample rate must be > 0".to_string()));
        }

        if self.frame_samples == 0 || self.frame_samples > MAX_FRAME_SAMPLES {
            return Err(StreamerError::Config(format!(
                "frame samples must be in 1..={MAX_FRAME_SAMPLES}, got {}",
                self.frame_samples
            )));
        }

        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(StreamerError::Config("speed must be > 0".to_string()));
        }

        if !(self.amplitude.is_finite() && self.noise.is_finite() && self.noise >= 0.0) {
            return Err(StreamerError::Config(
                "amplitude and noise must be finite".to_string(),
            ));
        }

        let nyquist = self.sample_rate as f64 / 2.0;
        if !self.tone_hz.is_finite() || self.tone_hz.abs() >= nyquist {
            return Err(StreamerError::Config(format!(
                "tone {} Hz is outside ±{nyquist} Hz",
                self.tone_hz
            )));
        }

        match self.meta_every {
            Some(0) => {
                return Err(StreamerError::Config("meta interval must be > 0".to_string()));
            }
            Some(_) if self.protocol == ProtocolKind::Ft32 => {
                return Err(StreamerError::Config(
                    "META frames are PHXI only".to_string(),
                ));
            }
            _ => {}
        }

        Ok(())
    }

    /// Магическое слово кадров с выборками.
    pub fn frame_magic(&self) -> u32 {
        match self.protocol {
            ProtocolKind::Ft32 => iqfall_core::MAGIC_DATA,
            _ => iqfall_core::MAGIC_IQDQ,
        }
    }

    /// Размер одного кадра на проводе, байт.
    pub fn frame_bytes(&self) -> usize {
        iqfall_core::FRAME_HEADER_SIZE
            + self.frame_samples as usize * self.sample_format.pair_size()
    }
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Разбирает частоту с суффиксом: `"2MHz"`, `"1.5kHz"`, `"-4kHz"`, `"2000000"`.
///
/// # Examples
///
/// ```
/// use iqfall_streamer::parse_freq_hz;
///
/// assert_eq!(parse_freq_hz("2MHz").unwrap(), 2_000_000.0);
/// assert_eq!(parse_freq_hz("-1.5kHz").unwrap(), -1_500.0);
/// assert_eq!(parse_freq_hz("12000").unwrap(), 12_000.0);
/// ```
pub fn parse_freq_hz(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let lower = s.to_lowercase();

    let (num_str, mult) = if let Some(v) = lower.strip_suffix("ghz") {
        (v.trim(), 1e9)
    } else if let Some(v) = lower.strip_suffix("mhz") {
        (v.trim(), 1e6)
    } else if let Some(v) = lower.strip_suffix("khz") {
        (v.trim(), 1e3)
    } else if let Some(v) = lower.strip_suffix("hz") {
        (v.trim(), 1.0)
    } else {
        (lower.as_str(), 1.0)
    };

    let n: f64 = num_str
        .parse()
        .map_err(|e| format!("Invalid frequency '{s}': {e}"))?;

    if !n.is_finite() {
        return Err(format!("Invalid frequency '{s}'"));
    }

    Ok(n * mult)
}

/// Частота дискретизации или несущая: неотрицательное целое в Гц.
pub fn parse_rate_hz(s: &str) -> Result<u64, String> {
    let hz = parse_freq_hz(s)?;

    if hz < 0.0 || hz > u64::MAX as f64 {
        return Err(format!("Frequency out of range: '{s}'"));
    }

    Ok(hz.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_freq_hz() {
        assert_eq!(parse_freq_hz("2MHz").unwrap(), 2_000_000.0);
        assert_eq!(parse_freq_hz("1.602GHz").unwrap(), 1_602_000_000.0);
        assert_eq!(parse_freq_hz("2000kHz").unwrap(), 2_000_000.0);
        assert_eq!(parse_freq_hz("-4 kHz").unwrap(), -4_000.0);
        assert_eq!(parse_freq_hz("750Hz").unwrap(), 750.0);
        assert!(parse_freq_hz("abc").is_err());
        assert!(parse_freq_hz("inf").is_err());
    }

    #[test]
    fn test_parse_rate_rejects_negative() {
        assert_eq!(parse_rate_hz("1MHz").unwrap(), 1_000_000);
        assert!(parse_rate_hz("-1MHz").is_err());
    }

    #[test]
    fn test_default_is_valid() {
        let cfg = StreamerConfig::default();

        cfg.validate().unwrap();
        assert_eq!(cfg.frame_magic(), iqfall_core::MAGIC_IQDQ);
        assert_eq!(cfg.frame_bytes(), 16 + 16_384 * 4);
    }

    #[test]
    fn test_ft32_requires_float32() {
        let mut cfg = StreamerConfig {
            protocol: ProtocolKind::Ft32,
            ..StreamerConfig::default()
        };

        assert!(matches!(cfg.validate(), Err(StreamerError::Config(_))));

        cfg.sample_format = SampleFormat::Float32;
        cfg.validate().unwrap();
        assert_eq!(cfg.frame_magic(), iqfall_core::MAGIC_DATA);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            StreamerConfig {
                protocol: ProtocolKind::Auto,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                sample_rate: 0,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                frame_samples: 0,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                frame_samples: MAX_FRAME_SAMPLES + 1,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                speed: 0.0,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                tone_hz: 1_000_000.0,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                noise: -0.1,
                ..StreamerConfig::default()
            },
            StreamerConfig {
                meta_every: Some(0),
                ..StreamerConfig::default()
            },
            StreamerConfig {
                protocol: ProtocolKind::Ft32,
                sample_format: SampleFormat::Float32,
                meta_every: Some(4),
                ..StreamerConfig::default()
            },
        ];

        for cfg in cases {
            assert!(cfg.validate().is_err(), "{cfg:?}");
        }
    }
}
