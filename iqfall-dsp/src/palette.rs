//! Цветовая шкала водопада: синий → голубой → зелёный → жёлтый → красный.

use crate::magnitude_db;

/// Минимальный диапазон нормирования, дБ.
pub const MIN_RANGE_DB: f32 = 20.0;

/// Цвет пикселя для амплитуды при текущих границах АРУ.
#[inline]
pub fn magnitude_to_rgb(
    mag: f32,
    peak_db: f32,
    floor_db: f32,
    gain_offset_db: f32,
) -> [u8; 3] {
    let db = magnitude_db(mag) + gain_offset_db;
    let range = (peak_db - floor_db).max(MIN_RANGE_DB);
    let norm = ((db - floor_db) / range).clamp(0.0, 1.0);

    level_to_rgb(norm)
}

/// Цвет для нормированного уровня `[0, 1]`, четыре отрезка по 0.25.
#[inline]
pub fn level_to_rgb(norm: f32) -> [u8; 3] {
    let ramp = |x: f32| (x * 4.0 * 255.0) as u8;

    if norm < 0.25 {
        [0, 0, ramp(norm)]
    } else if norm < 0.5 {
        [0, ramp(norm - 0.25), 255]
    } else if norm < 0.75 {
        [ramp(norm - 0.5), 255, ramp(0.75 - norm)]
    } else {
        [255, ramp(1.0 - norm), 0]
    }
}

/// Обратное преобразование: уровень `[0, 1]` по цвету шкалы.
///
/// Нужен для анализа снимков водопада (поиск самого яркого столбца).
pub fn level_of(rgb: [u8; 3]) -> f32 {
    let [r, g, b] = rgb.map(|c| c as f32 / 255.0);

    if rgb[0] == 0 && rgb[1] == 0 {
        b * 0.25
    } else if rgb[0] == 0 {
        0.25 + g * 0.25
    } else if rgb[0] < 255 {
        0.5 + r * 0.25
    } else {
        0.75 + (1.0 - g) * 0.25
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_endpoints() {
        assert_eq!(level_to_rgb(0.0), [0, 0, 0]);
        assert_eq!(level_to_rgb(0.25), [0, 0, 255]);
        assert_eq!(level_to_rgb(0.5), [0, 255, 255]);
        assert_eq!(level_to_rgb(0.75), [255, 255, 0]);
        assert_eq!(level_to_rgb(1.0), [255, 0, 0]);
    }

    #[test]
    fn test_below_floor_is_black() {
        assert_eq!(magnitude_to_rgb(0.0, -40.0, -80.0, 0.0), [0, 0, 0]);
    }

    #[test]
    fn test_above_peak_is_red() {
        assert_eq!(magnitude_to_rgb(1.0, -40.0, -80.0, 0.0), [255, 0, 0]);
    }

    #[test]
    fn test_narrow_range_widened() {
        // Диапазон 5 дБ расширяется до 20: уровень пола + 10 дБ = середина
        let mag = 10f32.powf((-80.0 + 10.0) / 20.0);
        let rgb = magnitude_to_rgb(mag, -75.0, -80.0, 0.0);

        assert!((level_of(rgb) - 0.5).abs() < 0.01, "{rgb:?}");
    }

    #[test]
    fn test_gain_offset_brightens() {
        let mag = 10f32.powf(-70.0 / 20.0);
        let dim = level_of(magnitude_to_rgb(mag, -40.0, -80.0, 0.0));
        let bright = level_of(magnitude_to_rgb(mag, -40.0, -80.0, 12.0));

        assert!(bright > dim);
    }

    #[test]
    fn test_level_of_monotonic() {
        let mut prev = -1.0;
        for k in 0..=200 {
            let level = level_of(level_to_rgb(k as f32 / 200.0));
            assert!(level >= prev, "k={k}: {level} < {prev}");
            prev = level;
        }
    }
}
