use std::f32::consts::PI;

const A0: f32 = 0.35875;
const A1: f32 = 0.48829;
const A2: f32 = 0.14128;
const A3: f32 = 0.01168;

/// 4-членное окно Блэкмана–Харриса по `n / (N - 1)`.
pub fn blackman_harris(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }

    let denom = (size - 1) as f32;

    (0..size)
        .map(|i| {
            let x = i as f32 / denom;
            A0 - A1 * (2.0 * PI * x).cos() + A2 * (4.0 * PI * x).cos()
                - A3 * (6.0 * PI * x).cos()
        })
        .collect()
}
