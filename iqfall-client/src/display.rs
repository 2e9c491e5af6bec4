//! Вывод кадров и ввод пользователя.
//!
//! [`Display`] скрывает конкретное окно: главный цикл только рисует
//! прямоугольники и текст поверх пикселей водопада, показывает кадр и
//! забирает события ввода. [`HeadlessDisplay`] собирает кадр в памяти и
//! периодически сохраняет его в PNG.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender};
use iqfall_dsp::{fill_rect, Rect, BYTES_PER_PIXEL};
use log::{debug, info};

use crate::{ClientError, ClientResult};

/// Клавиши, на которые реагирует клиент.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Q,
    Tab,
    Plus,
    Equals,
    KeypadPlus,
    Minus,
    KeypadMinus,
    R,
    T,
    Backspace,
    Enter,
}

/// Событие ввода.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Закрытие окна
    Quit,
    /// Новый размер окна в пикселях
    Resize { width: usize, height: usize },
    Key(Key),
    /// Введённый символ (для текстовых полей)
    Text(char),
    MouseMove { x: i32, y: i32 },
    MouseDown { x: i32, y: i32 },
    MouseUp { x: i32, y: i32 },
}

/// Строка текста, нарисованная поверх кадра.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextItem {
    pub x: usize,
    pub y: usize,
    pub text: String,
    pub rgb: [u8; 3],
}

/// Поверхность вывода.
pub trait Display {
    /// Забирает накопившиеся события ввода.
    fn poll_events(&mut self) -> Vec<InputEvent>;

    /// Текущий размер кадра в пикселях.
    fn size(&self) -> (usize, usize);

    /// Меняет размер кадра.
    fn resize(
        &mut self,
        width: usize,
        height: usize,
    ) -> ClientResult<()>;

    /// Копирует пиксели водопада (RGB, построчно) в начало кадра.
    fn draw_waterfall(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
    );

    fn draw_rect(
        &mut self,
        rect: Rect,
        rgb: [u8; 3],
    );

    fn draw_text(
        &mut self,
        x: usize,
        y: usize,
        text: &str,
        rgb: [u8; 3],
    );

    /// Показывает собранный кадр.
    fn present(
        &mut self,
        now: Instant,
    ) -> ClientResult<()>;
}

/// Вывод без окна: кадр в памяти, события из канала, снимки в PNG.
pub struct HeadlessDisplay {
    width: usize,
    height: usize,
    frame: Vec<u8>,
    overlay: Vec<TextItem>,
    last_overlay: Vec<TextItem>,
    events_tx: Sender<InputEvent>,
    events_rx: Receiver<InputEvent>,
    snapshot_path: Option<PathBuf>,
    snapshot_interval: Duration,
    last_snapshot: Option<Instant>,
    snapshots: u64,
    frames_presented: u64,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl HeadlessDisplay {
    pub fn new(
        width: usize,
        height: usize,
    ) -> ClientResult<Self> {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        Ok(Self {
            width,
            height,
            frame: alloc_frame(width, height)?,
            overlay: Vec::new(),
            last_overlay: Vec::new(),
            events_tx,
            events_rx,
            snapshot_path: None,
            snapshot_interval: Duration::from_secs(1),
            last_snapshot: None,
            snapshots: 0,
            frames_presented: 0,
        })
    }

    /// Включает периодическое сохранение кадра в PNG.
    pub fn with_snapshots(
        mut self,
        path: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        self.snapshot_path = Some(path.into());
        self.snapshot_interval = interval;
        self
    }

    /// Отправитель событий ввода (для внешнего источника событий и тестов).
    pub fn event_sender(&self) -> Sender<InputEvent> {
        self.events_tx.clone()
    }

    /// Сохраняет текущий кадр в PNG.
    pub fn save_png<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> ClientResult<()> {
        let img = image::RgbImage::from_raw(self.width as u32, self.height as u32, self.frame.clone())
            .ok_or_else(|| ClientError::Render("frame buffer size mismatch".to_string()))?;

        img.save(path.as_ref())
            .map_err(|e| ClientError::Render(format!("{}: {e}", path.as_ref().display())))
    }

    /// Пиксели последнего собранного кадра.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn pixel(
        &self,
        x: usize,
        y: usize,
    ) -> [u8; 3] {
        let i = (y * self.width + x) * BYTES_PER_PIXEL;
        [self.frame[i], self.frame[i + 1], self.frame[i + 2]]
    }

    /// Текст последнего показанного кадра.
    pub fn overlay_text(&self) -> &[TextItem] {
        &self.last_overlay
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }

    fn snapshot_due(
        &self,
        now: Instant,
    ) -> bool {
        match self.last_snapshot {
            None => true,
            Some(t) => now.saturating_duration_since(t) >= self.snapshot_interval,
        }
    }
}

fn alloc_frame(
    width: usize,
    height: usize,
) -> ClientResult<Vec<u8>> {
    let bytes = width * height * BYTES_PER_PIXEL;
    let mut frame = Vec::new();

    frame
        .try_reserve_exact(bytes)
        .map_err(|_| iqfall_types::ResourceError::AllocationFailed {
            what: "display frame",
            bytes,
        })?;
    frame.resize(bytes, 0);

    Ok(frame)
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Display for HeadlessDisplay {
    fn poll_events(&mut self) -> Vec<InputEvent> {
        self.events_rx.try_iter().collect()
    }

    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn resize(
        &mut self,
        width: usize,
        height: usize,
    ) -> ClientResult<()> {
        self.frame = alloc_frame(width, height)?;
        self.width = width;
        self.height = height;

        debug!("Display resized to {width}x{height}");
        Ok(())
    }

    fn draw_waterfall(
        &mut self,
        pixels: &[u8],
        width: usize,
        height: usize,
    ) {
        let w = width.min(self.width);
        let h = height.min(self.height);
        let row_bytes = w * BYTES_PER_PIXEL;

        for y in 0..h {
            let src = y * width * BYTES_PER_PIXEL;
            let dst = y * self.width * BYTES_PER_PIXEL;
            self.frame[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
        }
    }

    fn draw_rect(
        &mut self,
        rect: Rect,
        rgb: [u8; 3],
    ) {
        fill_rect(&mut self.frame, self.width, self.height, rect, rgb);
    }

    fn draw_text(
        &mut self,
        x: usize,
        y: usize,
        text: &str,
        rgb: [u8; 3],
    ) {
        self.overlay.push(TextItem {
            x,
            y,
            text: text.to_string(),
            rgb,
        });
    }

    fn present(
        &mut self,
        now: Instant,
    ) -> ClientResult<()> {
        self.frames_presented += 1;
        self.last_overlay = std::mem::take(&mut self.overlay);

        let Some(path) = self.snapshot_path.clone() else {
            return Ok(());
        };

        if !self.snapshot_due(now) {
            return Ok(());
        }

        self.last_snapshot = Some(now);
        self.save_png(&path)?;
        self.snapshots += 1;

        if self.snapshots == 1 {
            info!("Writing waterfall snapshots to {}", path.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_waterfall_clips() {
        let mut d = HeadlessDisplay::new(4, 2).unwrap();
        let pixels: Vec<u8> = (0..6 * 3 * 3).map(|v| v as u8).collect();

        d.draw_waterfall(&pixels, 6, 3);

        assert_eq!(d.pixel(0, 0), [0, 1, 2]);
        assert_eq!(d.pixel(3, 1), [27, 28, 29]);
    }

    #[test]
    fn test_draw_rect_and_text() {
        let mut d = HeadlessDisplay::new(20, 20).unwrap();
        d.draw_rect(Rect { x: 2, y: 3, w: 4, h: 4 }, [9, 8, 7]);
        d.draw_text(1, 1, "CONNECTED", [0, 255, 0]);
        d.present(Instant::now()).unwrap();

        assert_eq!(d.pixel(2, 3), [9, 8, 7]);
        assert_eq!(d.pixel(6, 3), [0, 0, 0]);
        assert_eq!(d.overlay_text().len(), 1);
        assert_eq!(d.overlay_text()[0].text, "CONNECTED");
        assert_eq!(d.frames_presented(), 1);
    }

    #[test]
    fn test_events_from_sender() {
        let mut d = HeadlessDisplay::new(8, 8).unwrap();
        let tx = d.event_sender();
        tx.send(InputEvent::Key(Key::Tab)).unwrap();
        tx.send(InputEvent::Quit).unwrap();

        assert_eq!(d.poll_events(), vec![InputEvent::Key(Key::Tab), InputEvent::Quit]);
        assert!(d.poll_events().is_empty());
    }

    #[test]
    fn test_resize() {
        let mut d = HeadlessDisplay::new(8, 8).unwrap();
        d.resize(16, 4).unwrap();

        assert_eq!(d.size(), (16, 4));
        assert_eq!(d.frame().len(), 16 * 4 * 3);
    }

    #[test]
    fn test_snapshot_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.png");
        let mut d = HeadlessDisplay::new(8, 8)
            .unwrap()
            .with_snapshots(&path, Duration::from_secs(1));

        let t0 = Instant::now();
        d.present(t0).unwrap();
        d.present(t0 + Duration::from_millis(500)).unwrap();
        d.present(t0 + Duration::from_millis(1_000)).unwrap();

        assert_eq!(d.snapshots(), 2);
        assert!(path.exists());
    }
}
