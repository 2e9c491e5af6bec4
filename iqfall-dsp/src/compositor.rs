//! Пиксельный буфер водопада.
//!
//! RGB, по 3 байта на пиксель, построчно; строка 0: самая новая. Каждый
//! кадр спектра сдвигает изображение на одну строку вниз (последняя строка
//! теряется) и рисует новую строку сверху.

use iqfall_types::ResourceError;

use crate::{
    agc::GainState,
    palette::{level_of, magnitude_to_rgb},
    try_alloc,
};

pub const BYTES_PER_PIXEL: usize = 3;

/// Размер индикатора состояния соединения, px.
pub const STATUS_INDICATOR_SIZE: usize = 12;
/// Отступ индикатора от правого и верхнего края, px.
pub const STATUS_INDICATOR_MARGIN: usize = 5;

pub const STATUS_CONNECTED_RGB: [u8; 3] = [0, 255, 0];
pub const STATUS_DISCONNECTED_RGB: [u8; 3] = [255, 0, 0];

/// Прямоугольник в пикселях.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

#[derive(Debug, Clone)]
pub struct WaterfallBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl WaterfallBuffer {
    pub fn new(
        width: usize,
        height: usize,
    ) -> Result<Self, ResourceError> {
        let width = width.max(1);
        let height = height.max(1);

        Ok(Self {
            width,
            height,
            pixels: try_alloc("waterfall pixels", width * height * BYTES_PER_PIXEL, 0u8)?,
        })
    }

    /// Перевыделяет буфер под новый размер и обнуляет его. При ошибке
    /// выделения прежний буфер остаётся в силе.
    pub fn resize(
        &mut self,
        width: usize,
        height: usize,
    ) -> Result<(), ResourceError> {
        let next = Self::new(width, height)?;
        *self = next;
        Ok(())
    }

    /// Сдвигает изображение на одну строку вниз.
    pub fn scroll(&mut self) {
        let stride = self.stride();
        let len = self.pixels.len();

        self.pixels.copy_within(0..len - stride, stride);
    }

    /// Рисует строку 0 по амплитудам столбцов.
    ///
    /// Если амплитуд меньше, чем столбцов, остаток строки заполняется
    /// чёрным.
    pub fn draw_row(
        &mut self,
        magnitudes: &[f32],
        gain: &GainState,
        gain_offset_db: f32,
    ) {
        let stride = self.stride();
        let row = &mut self.pixels[..stride];

        for (x, px) in row.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let rgb = match magnitudes.get(x) {
                Some(&m) => magnitude_to_rgb(m, gain.peak_db, gain.floor_db, gain_offset_db),
                None => [0, 0, 0],
            };
            px.copy_from_slice(&rgb);
        }
    }

    /// Сдвиг вниз и новая строка сверху.
    pub fn scroll_and_draw(
        &mut self,
        magnitudes: &[f32],
        gain: &GainState,
        gain_offset_db: f32,
    ) {
        self.scroll();
        self.draw_row(magnitudes, gain, gain_offset_db);
    }

    /// Столбец с максимальной яркостью в строке `y`.
    ///
    /// Насыщенные столбцы образуют плато вокруг сильного сигнала, поэтому
    /// возвращается середина плато.
    pub fn brightest_column(
        &self,
        y: usize,
    ) -> usize {
        let levels: Vec<f32> = self
            .row(y)
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|px| level_of([px[0], px[1], px[2]]))
            .collect();

        let max = levels.iter().copied().fold(0.0f32, f32::max);
        let (sum, count) = levels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l >= max)
            .fold((0usize, 0usize), |(s, c), (x, _)| (s + x, c + 1));

        if count == 0 {
            return 0;
        }
        sum / count
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    pub fn row(
        &self,
        y: usize,
    ) -> &[u8] {
        let stride = self.stride();
        &self.pixels[y * stride..(y + 1) * stride]
    }

    pub fn pixel(
        &self,
        x: usize,
        y: usize,
    ) -> [u8; 3] {
        let i = (y * self.width + x) * BYTES_PER_PIXEL;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn stride(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }
}

/// Положение индикатора состояния (правый верхний угол), обрезанное по
/// размеру кадра.
pub fn status_indicator_rect(
    width: usize,
    height: usize,
) -> Rect {
    let x = width.saturating_sub(STATUS_INDICATOR_SIZE + STATUS_INDICATOR_MARGIN);
    let y = STATUS_INDICATOR_MARGIN.min(height);

    Rect {
        x,
        y,
        w: STATUS_INDICATOR_SIZE.min(width - x),
        h: STATUS_INDICATOR_SIZE.min(height - y),
    }
}

/// Цвет индикатора для состояния соединения.
pub fn status_color(connected: bool) -> [u8; 3] {
    if connected {
        STATUS_CONNECTED_RGB
    } else {
        STATUS_DISCONNECTED_RGB
    }
}

/// Закрашивает прямоугольник в RGB кадре `width` × `height`.
pub fn fill_rect(
    frame: &mut [u8],
    width: usize,
    height: usize,
    rect: Rect,
    rgb: [u8; 3],
) {
    let x_end = (rect.x + rect.w).min(width);
    let y_end = (rect.y + rect.h).min(height);

    for y in rect.y..y_end {
        for x in rect.x..x_end {
            let i = (y * width + x) * BYTES_PER_PIXEL;
            frame[i..i + BYTES_PER_PIXEL].copy_from_slice(&rgb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Амплитуда, дающая уровень `level` при начальных границах АРУ.
    fn mag_for_level(level: f32) -> f32 {
        let g = GainState::new();
        let db = g.floor_db + level * (g.peak_db - g.floor_db);
        10f32.powf(db / 20.0)
    }

    #[test]
    fn test_row_k_lands_at_n_minus_k() {
        let mut wf = WaterfallBuffer::new(8, 16).unwrap();
        let gain = GainState::new();

        // Строка k имеет уровень k/16
        let n = 10;
        for k in 0..n {
            let m = mag_for_level(k as f32 / 16.0 + 0.01);
            wf.scroll_and_draw(&[m; 8], &gain, 0.0);
        }

        for k in 0..n {
            let y = n - 1 - k;
            let level = level_of(wf.pixel(3, y));
            let expected = k as f32 / 16.0 + 0.01;
            assert!((level - expected).abs() < 0.01, "row {k} at y={y}: {level}");
        }

        // Ниже отрисованных строк: чёрный
        assert_eq!(wf.pixel(0, n), [0, 0, 0]);
    }

    #[test]
    fn test_last_row_discarded() {
        let mut wf = WaterfallBuffer::new(2, 3).unwrap();
        let gain = GainState::new();

        wf.scroll_and_draw(&[1.0, 1.0], &gain, 0.0);
        for _ in 0..3 {
            wf.scroll_and_draw(&[0.0, 0.0], &gain, 0.0);
        }

        assert!(wf.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_short_magnitudes_padded_black() {
        let mut wf = WaterfallBuffer::new(4, 2).unwrap();
        wf.draw_row(&[1.0], &GainState::new(), 0.0);

        assert_eq!(wf.pixel(0, 0), [255, 0, 0]);
        assert_eq!(wf.pixel(3, 0), [0, 0, 0]);
    }

    #[test]
    fn test_brightest_column_plateau_center() {
        let mut wf = WaterfallBuffer::new(10, 1).unwrap();
        let mut mags = [0.0f32; 10];
        mags[4] = 1.0;
        mags[5] = 1.0;
        mags[6] = 1.0;
        mags[8] = mag_for_level(0.5);
        wf.draw_row(&mags, &GainState::new(), 0.0);

        assert_eq!(wf.brightest_column(0), 5);
    }

    #[test]
    fn test_resize_zeroes() {
        let mut wf = WaterfallBuffer::new(4, 4).unwrap();
        wf.draw_row(&[1.0; 4], &GainState::new(), 0.0);
        wf.resize(6, 5).unwrap();

        assert_eq!(wf.width(), 6);
        assert_eq!(wf.height(), 5);
        assert_eq!(wf.pixels().len(), 6 * 5 * 3);
        assert!(wf.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_status_indicator_top_right() {
        let r = status_indicator_rect(1024, 600);
        assert_eq!(
            r,
            Rect {
                x: 1024 - 17,
                y: 5,
                w: 12,
                h: 12
            }
        );

        let mut frame = vec![0u8; 1024 * 600 * 3];
        fill_rect(&mut frame, 1024, 600, r, status_color(true));

        let i = (5 * 1024 + 1024 - 17) * 3;
        assert_eq!(&frame[i..i + 3], &[0, 255, 0]);
        assert_eq!(&frame[0..3], &[0, 0, 0]);
    }

    #[test]
    fn test_status_indicator_tiny_frame() {
        let r = status_indicator_rect(8, 4);

        assert!(r.x + r.w <= 8);
        assert!(r.y + r.h <= 4);
    }
}
