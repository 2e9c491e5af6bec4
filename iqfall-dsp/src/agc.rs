use crate::magnitude_db;

/// Скорость приближения к уровню кадра, когда он выходит за границу.
pub const AGC_ATTACK: f32 = 0.05;
/// Скорость возврата, когда уровень кадра внутри границ.
pub const AGC_DECAY: f32 = 0.002;

pub const INITIAL_PEAK_DB: f32 = -40.0;
pub const INITIAL_FLOOR_DB: f32 = -80.0;

/// Состояние автоматической регулировки яркости водопада.
///
/// Пик быстро поднимается за громким сигналом и медленно опускается; пол
/// шума быстро опускается и медленно поднимается.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainState {
    pub peak_db: f32,
    pub floor_db: f32,
}

impl Default for GainState {
    fn default() -> Self {
        Self {
            peak_db: INITIAL_PEAK_DB,
            floor_db: INITIAL_FLOOR_DB,
        }
    }
}

impl GainState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Обновляет границы по амплитудам одного кадра спектра.
    /// Пустой кадр ничего не меняет.
    pub fn update(
        &mut self,
        magnitudes: &[f32],
    ) {
        let Some((frame_max, frame_min)) = frame_range_db(magnitudes) else {
            return;
        };

        self.track(frame_max, frame_min);
    }

    /// Шаг по уже посчитанным уровням кадра, дБ.
    pub fn track(
        &mut self,
        frame_max_db: f32,
        frame_min_db: f32,
    ) {
        let k = if frame_max_db > self.peak_db {
            AGC_ATTACK
        } else {
            AGC_DECAY
        };
        self.peak_db += k * (frame_max_db - self.peak_db);

        let k = if frame_min_db < self.floor_db {
            AGC_ATTACK
        } else {
            AGC_DECAY
        };
        self.floor_db += k * (frame_min_db - self.floor_db);
    }

    /// Динамический диапазон, дБ.
    pub fn range_db(&self) -> f32 {
        self.peak_db - self.floor_db
    }
}

/// Максимум и минимум уровня кадра в дБ.
pub fn frame_range_db(magnitudes: &[f32]) -> Option<(f32, f32)> {
    if magnitudes.is_empty() {
        return None;
    }

    let (max, min) = magnitudes
        .iter()
        .map(|&m| magnitude_db(m))
        .fold((f32::MIN, f32::MAX), |(hi, lo), db| (hi.max(db), lo.min(db)));

    Some((max, min))
}
