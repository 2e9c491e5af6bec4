use iqfall_types::ProtocolError;
use thiserror::Error;

pub type StreamerResult<T> = std::result::Result<T, StreamerError>;

#[derive(Debug, Error)]
pub enum StreamerError {
    /// Сетевые ошибки (bind, accept, запись в сокет)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка wire-протокола
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Некорректные параметры источника
    #[error("Config error: {0}")]
    Config(String),
}

impl StreamerError {
    /// `true`, если клиент просто ушёл (закрыл сокет посреди потока).
    pub fn is_client_gone(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            StreamerError::Io(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn test_client_gone_kinds() {
        let gone: StreamerError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        let other: StreamerError = io::Error::new(io::ErrorKind::AddrInUse, "busy").into();

        assert!(gone.is_client_gone());
        assert!(!other.is_client_gone());
        assert!(!StreamerError::Config("x".into()).is_client_gone());
    }

    #[test]
    fn test_protocol_error_message() {
        let e: StreamerError = ProtocolError::UnsupportedFormat(9).into();

        assert!(e.to_string().contains("Unsupported sample format: 9"));
    }
}
