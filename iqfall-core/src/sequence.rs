use log::warn;

/// Отслеживает непрерывность номеров кадров.
///
/// Номер должен быть равен предыдущему + 1 (с переполнением через
/// `u32::MAX`). Разрыв только логируется: поток продолжается.
#[derive(Debug, Default, Clone)]
pub struct SequenceTracker {
    last: Option<u32>,
    gaps: u64,
    dropped: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует номер кадра. Возвращает число пропущенных кадров, если
    /// обнаружен разрыв.
    pub fn observe(
        &mut self,
        sequence: u32,
    ) -> Option<u32> {
        let gap = match self.last {
            Some(last) if sequence != last.wrapping_add(1) => {
                let dropped = sequence.wrapping_sub(last).wrapping_sub(1);
                warn!("Dropped {dropped} frame(s) (seq {last} → {sequence})");
                self.gaps += 1;
                self.dropped += dropped as u64;
                Some(dropped)
            }
            _ => None,
        };

        self.last = Some(sequence);
        gap
    }

    /// Сбрасывает состояние (новое соединение).
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<u32> {
        self.last
    }

    /// Количество обнаруженных разрывов.
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    /// Суммарно пропущено кадров.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
