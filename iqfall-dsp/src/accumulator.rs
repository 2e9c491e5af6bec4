use iqfall_types::{IqSample, ResourceError};

use crate::try_alloc;

/// Кольцевой буфер I/Q выборок фиксированной ёмкости.
///
/// Выделяется один раз и перезаписывается по месту. Счётчик новых выборок
/// определяет, когда пора пересчитать спектр: при пороге в половину ёмкости
/// соседние окна перекрываются на 50 %.
#[derive(Debug, Clone)]
pub struct IqRing {
    buf: Vec<IqSample>,
    write_index: usize,
    new_count: usize,
    threshold: usize,
}

impl IqRing {
    pub fn new(
        capacity: usize,
        threshold: usize,
    ) -> Result<Self, ResourceError> {
        let capacity = capacity.max(1);

        Ok(Self {
            buf: try_alloc("I/Q ring", capacity, IqSample::ZERO)?,
            write_index: 0,
            new_count: 0,
            threshold: threshold.clamp(1, capacity),
        })
    }

    #[inline]
    pub fn push(
        &mut self,
        sample: IqSample,
    ) {
        self.buf[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % self.buf.len();
        self.new_count = self.new_count.saturating_add(1);
    }

    /// Накоплено ли достаточно новых выборок для следующего кадра спектра.
    pub fn ready(&self) -> bool {
        self.new_count >= self.threshold
    }

    /// Копирует содержимое в хронологическом порядке (от самой старой
    /// выборки, т.е. начиная с позиции записи). Состояние не меняется.
    pub fn snapshot_into(
        &self,
        out: &mut [IqSample],
    ) {
        let (newer, older) = self.buf.split_at(self.write_index);
        let n = older.len();

        out[..n].copy_from_slice(older);
        out[n..n + newer.len()].copy_from_slice(newer);
    }

    pub fn snapshot(&self) -> Vec<IqSample> {
        let mut out = vec![IqSample::ZERO; self.buf.len()];
        self.snapshot_into(&mut out);
        out
    }

    pub fn reset_new_count(&mut self) {
        self.new_count = 0;
    }

    /// Обнуляет содержимое (новый поток).
    pub fn clear(&mut self) {
        self.buf.fill(IqSample::ZERO);
        self.write_index = 0;
        self.new_count = 0;
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn new_count(&self) -> usize {
        self.new_count
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(k: usize) -> IqSample {
        IqSample::new(k as f32, 0.0)
    }

    #[test]
    fn test_ready_cadence() {
        let mut ring = IqRing::new(2048, 1024).unwrap();
        let mut fired = Vec::new();

        for k in 1..=4096 {
            ring.push(s(k));
            if ring.ready() {
                fired.push(k);
                ring.reset_new_count();
            }
        }

        assert_eq!(fired, vec![1024, 2048, 3072, 4096]);
    }

    #[test]
    fn test_not_ready_below_threshold() {
        let mut ring = IqRing::new(2048, 1024).unwrap();
        for k in 0..1023 {
            ring.push(s(k));
        }

        assert!(!ring.ready());
        ring.push(s(0));
        assert!(ring.ready());
    }

    #[test]
    fn test_snapshot_chronological_after_wrap() {
        let mut ring = IqRing::new(4, 2).unwrap();
        for k in 0..6 {
            ring.push(s(k));
        }

        let snap: Vec<f32> = ring.snapshot().iter().map(|x| x.i).collect();
        assert_eq!(snap, vec![2.0, 3.0, 4.0, 5.0]);

        // Снимок не сбрасывает счётчик
        assert_eq!(ring.new_count(), 6);
    }

    #[test]
    fn test_clear() {
        let mut ring = IqRing::new(4, 2).unwrap();
        ring.push(s(7));
        ring.clear();

        assert!(!ring.ready());
        assert!(ring.snapshot().iter().all(|x| *x == IqSample::ZERO));
    }
}
