//! Понижение частоты дискретизации до частоты отображения.
//!
//! Простой box-фильтр (integrate-and-dump): `ratio` входных выборок
//! усредняются в одну выходную. Для водопада этого достаточно, а стоимость
//! на выборку постоянна.

use iqfall_types::IqSample;
use log::warn;

/// Дециматор одного канала.
#[derive(Debug, Clone)]
pub struct Decimator {
    acc: f32,
    count: u32,
    ratio: u32,
}

impl Decimator {
    pub fn new(ratio: u32) -> Self {
        Self {
            acc: 0.0,
            count: 0,
            ratio: ratio.max(1),
        }
    }

    /// Добавляет выборку; каждые `ratio` входов возвращает среднее.
    #[inline]
    pub fn process(
        &mut self,
        x: f32,
    ) -> Option<f32> {
        self.acc += x;
        self.count += 1;

        if self.count < self.ratio {
            return None;
        }

        let y = self.acc / self.ratio as f32;
        self.acc = 0.0;
        self.count = 0;
        Some(y)
    }

    pub fn reset(&mut self) {
        self.acc = 0.0;
        self.count = 0;
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// `false`, если источник уже идёт на частоте отображения.
    pub fn is_active(&self) -> bool {
        self.ratio > 1
    }
}

/// Коэффициент децимации для пары частот.
pub fn decimation_ratio(
    source_rate: u32,
    display_rate: u32,
) -> u32 {
    if display_rate == 0 {
        return 1;
    }
    (source_rate / display_rate).max(1)
}

/// Пара дециматоров I и Q, работающих синхронно.
///
/// Если в одном такте готов только один канал, пара отбрасывается и
/// учитывается в [`IqDecimator::dropped_pairs`]. При синхронной подаче
/// этого не происходит.
#[derive(Debug, Clone)]
pub struct IqDecimator {
    i: Decimator,
    q: Decimator,
    dropped_pairs: u64,
}

impl IqDecimator {
    pub fn new(ratio: u32) -> Self {
        Self {
            i: Decimator::new(ratio),
            q: Decimator::new(ratio),
            dropped_pairs: 0,
        }
    }

    pub fn for_rates(
        source_rate: u32,
        display_rate: u32,
    ) -> Self {
        Self::new(decimation_ratio(source_rate, display_rate))
    }

    #[inline]
    pub fn process(
        &mut self,
        s: IqSample,
    ) -> Option<IqSample> {
        match (self.i.process(s.i), self.q.process(s.q)) {
            (Some(i), Some(q)) => Some(IqSample::new(i, q)),
            (None, None) => None,
            _ => {
                self.dropped_pairs += 1;
                warn!("Decimator channels out of step, pair dropped");
                None
            }
        }
    }

    pub fn reset(&mut self) {
        self.i.reset();
        self.q.reset();
    }

    pub fn ratio(&self) -> u32 {
        self.i.ratio()
    }

    pub fn is_active(&self) -> bool {
        self.i.is_active()
    }

    pub fn dropped_pairs(&self) -> u64 {
        self.dropped_pairs
    }
}
