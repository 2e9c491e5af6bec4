/// Комплексная выборка, нормированная примерно к [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IqSample {
    pub i: f32,
    pub q: f32,
}

impl IqSample {
    pub const ZERO: IqSample = IqSample { i: 0.0, q: 0.0 };

    pub fn new(
        i: f32,
        q: f32,
    ) -> Self {
        Self { i, q }
    }
}
