use crate::SampleFormat;

/// Вариант wire-протокола источника.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// PHXI заголовок + IQDQ/META кадры, любой формат выборок
    Phxi,
    /// Упрощённый FT32 заголовок + DATA кадры, всегда Float32
    Ft32,
    /// Определяется по первому магическому слову потока
    Auto,
}

/// Порядок байт многобайтовых полей на проводе.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrderKind {
    #[default]
    Little,
    Big,
}

/// Заголовок PHXI потока (32 байта на проводе)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Версия протокола
    pub version: u32,
    /// Частота дискретизации в Гц
    pub sample_rate: u32,
    /// Формат IQ выборок в кадрах
    pub sample_format: SampleFormat,
    /// Несущая частота в Гц
    pub center_freq: u64,
    /// Ослабление усиления в десятых долях дБ (250 = 25.0 дБ)
    pub gain_reduction: i32,
    /// Состояние LNA
    pub lna_enabled: bool,
}

/// Заголовок кадра с выборками (16 байт на проводе).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrameHeader {
    /// Порядковый номер, переполняется через u32::MAX
    pub sequence: u32,
    /// Количество IQ пар в кадре
    pub sample_count: u32,
    /// Зарезервировано
    pub flags: u32,
}

/// Внеполосное обновление параметров (META кадр).
///
/// `sample_rate` и `sample_format` берутся из зарезервированных слов: `0`
/// означает "без изменений".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaUpdate {
    pub sequence: u32,
    pub center_freq: u64,
    pub gain_reduction: i32,
    pub lna_enabled: bool,
    pub sample_rate: Option<u32>,
    pub sample_format: Option<SampleFormat>,
}

/// Параметры потока, полученные при рукопожатии.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub protocol: ProtocolKind,
    pub version: u32,
    pub sample_rate: u32,
    pub sample_format: SampleFormat,
    pub center_freq: u64,
    pub gain_reduction: i32,
    pub lna_enabled: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StreamHeader {
    pub fn new(
        sample_rate: u32,
        sample_format: SampleFormat,
        center_freq: u64,
    ) -> Self {
        Self {
            version: 1,
            sample_rate,
            sample_format,
            center_freq,
            gain_reduction: 0,
            lna_enabled: false,
        }
    }

    /// Усиление в дБ (из десятых долей).
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction as f32 / 10.0
    }
}

impl DataFrameHeader {
    pub fn new(
        sequence: u32,
        sample_count: u32,
    ) -> Self {
        Self {
            sequence,
            sample_count,
            flags: 0,
        }
    }

    /// Размер полезной нагрузки кадра для заданного формата.
    pub fn payload_len(
        &self,
        format: SampleFormat,
    ) -> usize {
        self.sample_count as usize * format.pair_size()
    }
}

impl MetaUpdate {
    /// `true`, если обновление меняет частоту или формат текущего потока.
    pub fn changes_stream_format(
        &self,
        info: &StreamInfo,
    ) -> bool {
        let rate_changed = self.sample_rate.is_some_and(|r| r != info.sample_rate);
        let format_changed = self.sample_format.is_some_and(|f| f != info.sample_format);

        rate_changed || format_changed
    }
}

impl StreamInfo {
    /// Информация о потоке из PHXI заголовка.
    pub fn from_phxi(h: &StreamHeader) -> Self {
        Self {
            protocol: ProtocolKind::Phxi,
            version: h.version,
            sample_rate: h.sample_rate,
            sample_format: h.sample_format,
            center_freq: h.center_freq,
            gain_reduction: h.gain_reduction,
            lna_enabled: h.lna_enabled,
        }
    }

    /// Информация о потоке FT32: всегда Float32, без метаданных тюнера.
    pub fn ft32(sample_rate: u32) -> Self {
        Self {
            protocol: ProtocolKind::Ft32,
            version: 0,
            sample_rate,
            sample_format: SampleFormat::Float32,
            center_freq: 0,
            gain_reduction: 0,
            lna_enabled: false,
        }
    }

    /// Применяет META обновление частоты/усиления/LNA.
    pub fn apply_meta(
        &mut self,
        meta: &MetaUpdate,
    ) {
        self.center_freq = meta.center_freq;
        self.gain_reduction = meta.gain_reduction;
        self.lna_enabled = meta.lna_enabled;
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl std::fmt::Display for ProtocolKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ProtocolKind::Phxi => write!(f, "phxi"),
            ProtocolKind::Ft32 => write!(f, "ft32"),
            ProtocolKind::Auto => write!(f, "auto"),
        }
    }
}

impl std::str::FromStr for ProtocolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phxi" | "iqdq" => Ok(ProtocolKind::Phxi),
            "ft32" | "legacy" => Ok(ProtocolKind::Ft32),
            "auto" => Ok(ProtocolKind::Auto),
            _ => Err(format!("Unknown protocol '{s}'. Use: phxi, ft32, auto")),
        }
    }
}

impl std::fmt::Display for ByteOrderKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ByteOrderKind::Little => write!(f, "le"),
            ByteOrderKind::Big => write!(f, "be"),
        }
    }
}

impl std::str::FromStr for ByteOrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "le" | "little" => Ok(ByteOrderKind::Little),
            "be" | "big" | "network" => Ok(ByteOrderKind::Big),
            _ => Err(format!("Unknown byte order '{s}'. Use: le, be")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> StreamInfo {
        StreamInfo::from_phxi(&StreamHeader::new(
            2_000_000,
            SampleFormat::Float32,
            10_000_000,
        ))
    }

    #[test]
    fn test_payload_len() {
        let h = DataFrameHeader::new(7, 1024);

        assert_eq!(h.payload_len(SampleFormat::Int16), 4096);
        assert_eq!(h.payload_len(SampleFormat::Float32), 8192);
        assert_eq!(h.payload_len(SampleFormat::UInt8), 2048);
    }

    #[test]
    fn test_meta_changes_stream_format() {
        let info = info();
        let mut meta = MetaUpdate {
            sequence: 1,
            center_freq: 5_000_000,
            gain_reduction: 300,
            lna_enabled: true,
            sample_rate: None,
            sample_format: None,
        };

        assert!(!meta.changes_stream_format(&info));

        meta.sample_rate = Some(2_000_000);
        assert!(!meta.changes_stream_format(&info), "same rate is no change");

        meta.sample_format = Some(SampleFormat::Int16);
        assert!(meta.changes_stream_format(&info));
    }

    #[test]
    fn test_apply_meta_keeps_format() {
        let mut info = info();
        let meta = MetaUpdate {
            sequence: 9,
            center_freq: 7_000_000,
            gain_reduction: -15,
            lna_enabled: true,
            sample_rate: None,
            sample_format: None,
        };

        info.apply_meta(&meta);

        assert_eq!(info.center_freq, 7_000_000);
        assert_eq!(info.gain_reduction, -15);
        assert!(info.lna_enabled);
        assert_eq!(info.sample_format, SampleFormat::Float32);
    }

    #[test]
    fn test_protocol_kind_fromstr() {
        assert_eq!("phxi".parse::<ProtocolKind>().unwrap(), ProtocolKind::Phxi);
        assert_eq!("FT32".parse::<ProtocolKind>().unwrap(), ProtocolKind::Ft32);
        assert_eq!("auto".parse::<ProtocolKind>().unwrap(), ProtocolKind::Auto);
        assert!("tcp".parse::<ProtocolKind>().is_err());
        assert_eq!("be".parse::<ByteOrderKind>().unwrap(), ByteOrderKind::Big);
    }
}
