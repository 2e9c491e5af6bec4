use iqfall_types::{ConfigError, ProtocolError, ResourceError};
use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Ошибка wire-протокола (рукопожатие или поток кадров)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Не удалось выделить буферы
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Ошибка файла конфигурации
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Сетевые и файловые ошибки
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Не удалось подключиться к источнику
    #[error("Cannot connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Ошибка вывода кадра
    #[error("Render error: {0}")]
    Render(String),

    /// Ошибка обнаружения сервисов
    #[error("Discovery error: {0}")]
    Discovery(String),
}

impl ClientError {
    pub fn connect<E: Into<String>, R: ToString>(
        endpoint: E,
        reason: R,
    ) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let e: ClientError = ProtocolError::ConnectionClosed.into();

        assert!(matches!(e, ClientError::Protocol(ProtocolError::ConnectionClosed)));
        assert!(e.to_string().contains("closed"));
    }

    #[test]
    fn test_connect_message() {
        let e = ClientError::connect("localhost:4536", "refused");

        assert_eq!(e.to_string(), "Cannot connect to localhost:4536: refused");
    }
}
