use std::io::{ErrorKind, Read};

use iqfall_types::{ProtocolError, ProtocolResult};

/// Результат попытки дочитать буфер.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Буфер заполнен полностью
    Complete,
    /// Истёк таймаут чтения; прогресс сохранён в `filled`
    Pending,
}

/// Чтение точного количества байт поверх сокета с таймаутом.
///
/// Короткие чтения повторяются, пока буфер не заполнен, не истёк таймаут или
/// удалённая сторона не закрыла соединение. Чтение нуля байт всегда означает
/// закрытое соединение, а не отсутствие данных.
pub struct ExactReader<R: Read> {
    inner: R,
    bytes_read: u64,
}

impl<R: Read> ExactReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    /// Дочитывает `buf[*filled..]`. При таймауте возвращает
    /// [`Fill::Pending`], оставляя `filled` указывать на уже полученные байты.
    pub fn fill(
        &mut self,
        buf: &mut [u8],
        filled: &mut usize,
    ) -> ProtocolResult<Fill> {
        while *filled < buf.len() {
            match self.inner.read(&mut buf[*filled..]) {
                Ok(0) => return Err(ProtocolError::ConnectionClosed),
                Ok(n) => {
                    *filled += n;
                    self.bytes_read += n as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout(e.kind()) => return Ok(Fill::Pending),
                Err(e) if is_disconnect(e.kind()) => return Err(ProtocolError::ConnectionClosed),
                Err(e) => return Err(ProtocolError::Io(e)),
            }
        }

        Ok(Fill::Complete)
    }

    /// Читает буфер целиком; таймаут превращается в [`ProtocolError::Timeout`].
    pub fn read_exact_or_timeout(
        &mut self,
        buf: &mut [u8],
    ) -> ProtocolResult<()> {
        let mut filled = 0;

        match self.fill(buf, &mut filled)? {
            Fill::Complete => Ok(()),
            Fill::Pending => Err(ProtocolError::Timeout),
        }
    }

    /// Всего прочитано байт.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn is_timeout(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::UnexpectedEof
    )
}
