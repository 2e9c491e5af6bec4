use thiserror::Error;

/// Результат для операций протокола
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

/// Результат для операций конфигурации
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Ошибки wire-протокола (рукопожатие и поток кадров).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Неправильное магическое число заголовка потока
    #[error("Bad magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    /// За отведённое время не пришло ни одного байта
    #[error("Timed out waiting for data")]
    Timeout,

    /// Удалённая сторона закрыла соединение (чтение вернуло 0 байт)
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Неизвестный тип кадра: раскладка неизвестна, продолжать нельзя
    #[error("Unknown frame type: magic {0:#010x}")]
    UnknownFrameType(u32),

    /// Источник объявил неподдерживаемый формат выборок
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(u32),

    /// Кадр заявляет больше выборок, чем допускает клиент
    #[error("Frame too large: {samples} samples (limit {limit})")]
    FrameTooLarge { samples: u32, limit: u32 },

    /// Не удалось выделить буфер под полезную нагрузку
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Прочие ошибки ввода/вывода
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки выделения ресурсов (буферы пикселей, рабочие буферы FFT).
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Allocation failed: {what} ({bytes} bytes)")]
    AllocationFailed { what: &'static str, bytes: usize },
}

/// Ошибки файла конфигурации.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Некорректное значение ключа
    #[error("Invalid value for '{key}': '{value}'")]
    InvalidValue { key: String, value: String },

    /// Ошибки чтения/записи файла
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Удобные конструкторы
    pub fn bad_magic(
        expected: u32,
        found: u32,
    ) -> Self {
        Self::BadMagic { expected, found }
    }

    /// `true` для ошибок, после которых соединение нельзя продолжать.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProtocolError::Timeout)
    }
}

impl ConfigError {
    pub fn invalid_value<K: Into<String>, V: Into<String>>(
        key: K,
        value: V,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}
