//! Панель настроек поверх водопада: адрес источника, порт, усиление и
//! кнопка подключения.
//!
//! Панель хранит только состояние виджетов. Изменения возвращаются в виде
//! [`SettingsAction`], применяет их главный цикл.

use iqfall_dsp::Rect;

use crate::{
    config::{DEFAULT_PORT, GAIN_MAX_DB, GAIN_MIN_DB},
    display::{Display, InputEvent, Key},
};

pub const PANEL_WIDTH: usize = 250;
pub const PANEL_HEIGHT: usize = 220;

const PANEL_PADDING: usize = 15;
const FIRST_WIDGET_Y: usize = 40;
const HOST_MAX_LEN: usize = 64;
const PORT_MAX_LEN: usize = 6;

const COLOR_BG_PANEL: [u8; 3] = [0x16, 0x21, 0x3E];
const COLOR_ACCENT: [u8; 3] = [0x00, 0xD9, 0xFF];
const COLOR_ACCENT_DIM: [u8; 3] = [0x00, 0x77, 0x99];
const COLOR_TEXT: [u8; 3] = [0xE8, 0xE8, 0xE8];
const COLOR_TEXT_DIM: [u8; 3] = [0x88, 0x88, 0x88];
const COLOR_GREEN: [u8; 3] = [0x00, 0xFF, 0x88];
const COLOR_RED: [u8; 3] = [0xFF, 0x44, 0x44];
const COLOR_BUTTON: [u8; 3] = [0x2D, 0x4A, 0x7C];
const COLOR_BUTTON_HOVER: [u8; 3] = [0x3D, 0x5A, 0x8C];
const COLOR_BUTTON_ACTIVE: [u8; 3] = [0x4D, 0x6A, 0x9C];
const COLOR_SLIDER_BG: [u8; 3] = [0x33, 0x33, 0x55];
const COLOR_SLIDER_FG: [u8; 3] = [0x00, 0xAA, 0xFF];
const COLOR_INPUT_BG: [u8; 3] = [0x22, 0x22, 0x44];
const COLOR_INPUT_BORDER: [u8; 3] = [0x44, 0x44, 0x66];
const COLOR_INPUT_FOCUS: [u8; 3] = [0x00, 0xAA, 0xFF];

/// Изменение, сделанное пользователем в панели.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    HostChanged(String),
    PortChanged(u16),
    GainChanged(f32),
    /// Кнопка Connect/Disconnect
    ToggleConnection,
}

/// Однострочное поле ввода.
#[derive(Debug, Clone)]
pub struct TextField {
    pub rect: Rect,
    pub label: &'static str,
    text: String,
    max_len: usize,
    numeric: bool,
    focused: bool,
}

/// Горизонтальный ползунок с целыми значениями.
#[derive(Debug, Clone)]
pub struct Slider {
    pub rect: Rect,
    pub label: &'static str,
    min: i32,
    max: i32,
    value: i32,
    dragging: bool,
}

#[derive(Debug, Clone)]
pub struct Button {
    pub rect: Rect,
    hovered: bool,
    pressed: bool,
}

pub struct SettingsPanel {
    host: TextField,
    port: TextField,
    gain: Slider,
    connect: Button,
    origin: (usize, usize),
}

////////////////////////////////////////////////////////////////////////////////
// Виджеты
////////////////////////////////////////////////////////////////////////////////

fn contains(
    rect: Rect,
    x: i32,
    y: i32,
) -> bool {
    x >= rect.x as i32
        && y >= rect.y as i32
        && x < (rect.x + rect.w) as i32
        && y < (rect.y + rect.h) as i32
}

fn draw_outline<D: Display + ?Sized>(
    display: &mut D,
    r: Rect,
    rgb: [u8; 3],
) {
    display.draw_rect(Rect { h: 1, ..r }, rgb);
    display.draw_rect(Rect { y: r.y + r.h.saturating_sub(1), h: 1, ..r }, rgb);
    display.draw_rect(Rect { w: 1, ..r }, rgb);
    display.draw_rect(Rect { x: r.x + r.w.saturating_sub(1), w: 1, ..r }, rgb);
}

impl TextField {
    fn new(
        label: &'static str,
        w: usize,
        max_len: usize,
        numeric: bool,
    ) -> Self {
        Self {
            rect: Rect { x: 0, y: 0, w, h: 24 },
            label,
            text: String::new(),
            max_len,
            numeric,
            focused: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(
        &mut self,
        text: &str,
    ) {
        self.text = text.chars().take(self.max_len).collect();
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// Возвращает `true`, если текст изменился или ввод подтверждён.
    fn handle(
        &mut self,
        event: &InputEvent,
    ) -> bool {
        match *event {
            InputEvent::MouseDown { x, y } => {
                self.focused = contains(self.rect, x, y);
                false
            }
            InputEvent::Text(c) if self.focused => {
                if self.numeric && !c.is_ascii_digit() {
                    return false;
                }
                if self.text.chars().count() >= self.max_len {
                    return false;
                }
                self.text.push(c);
                true
            }
            InputEvent::Key(Key::Backspace) if self.focused => self.text.pop().is_some(),
            InputEvent::Key(Key::Enter) if self.focused => {
                self.focused = false;
                true
            }
            InputEvent::Key(Key::Escape) if self.focused => {
                self.focused = false;
                false
            }
            _ => false,
        }
    }

    fn draw<D: Display + ?Sized>(
        &self,
        display: &mut D,
    ) {
        let r = self.rect;
        display.draw_text(r.x, r.y.saturating_sub(16), self.label, COLOR_TEXT_DIM);
        display.draw_rect(r, COLOR_INPUT_BG);
        draw_outline(
            display,
            r,
            if self.focused { COLOR_INPUT_FOCUS } else { COLOR_INPUT_BORDER },
        );
        display.draw_text(r.x + 4, r.y + 5, &self.text, COLOR_TEXT);
    }
}

impl Slider {
    fn new(
        label: &'static str,
        min: i32,
        max: i32,
    ) -> Self {
        Self {
            rect: Rect { x: 0, y: 0, w: 220, h: 20 },
            label,
            min,
            max,
            value: min,
            dragging: false,
        }
    }

    pub fn value(&self) -> i32 {
        self.value
    }

    pub fn set_value(
        &mut self,
        value: i32,
    ) {
        self.value = value.clamp(self.min, self.max);
    }

    fn value_at(
        &self,
        x: i32,
    ) -> i32 {
        let ratio = ((x - self.rect.x as i32) as f32 / self.rect.w as f32).clamp(0.0, 1.0);
        self.min + (ratio * (self.max - self.min) as f32) as i32
    }

    /// Возвращает `true`, если значение изменилось.
    fn handle(
        &mut self,
        event: &InputEvent,
    ) -> bool {
        let old = self.value;

        match *event {
            InputEvent::MouseDown { x, y } if contains(self.rect, x, y) => {
                self.dragging = true;
                self.value = self.value_at(x);
            }
            InputEvent::MouseMove { x, .. } if self.dragging => {
                self.value = self.value_at(x);
            }
            InputEvent::MouseUp { .. } => self.dragging = false,
            _ => {}
        }

        self.value != old
    }

    fn draw<D: Display + ?Sized>(
        &self,
        display: &mut D,
    ) {
        let r = self.rect;
        display.draw_text(r.x, r.y.saturating_sub(16), self.label, COLOR_TEXT_DIM);
        display.draw_rect(r, COLOR_SLIDER_BG);
        draw_outline(display, r, COLOR_ACCENT_DIM);

        let ratio = (self.value - self.min) as f32 / (self.max - self.min) as f32;
        let fill_w = (ratio * r.w as f32) as usize;
        if fill_w > 0 {
            display.draw_rect(
                Rect {
                    x: r.x,
                    y: r.y + 2,
                    w: fill_w,
                    h: r.h.saturating_sub(4),
                },
                COLOR_SLIDER_FG,
            );
        }

        display.draw_text(r.x + r.w / 2, r.y + 4, &format!("{:+} dB", self.value), COLOR_TEXT);
    }
}

impl Button {
    fn new() -> Self {
        Self {
            rect: Rect { x: 0, y: 0, w: 100, h: 28 },
            hovered: false,
            pressed: false,
        }
    }

    /// Возвращает `true` на отпускании кнопки мыши над кнопкой.
    fn handle(
        &mut self,
        event: &InputEvent,
    ) -> bool {
        match *event {
            InputEvent::MouseMove { x, y } => {
                self.hovered = contains(self.rect, x, y);
                false
            }
            InputEvent::MouseDown { x, y } => {
                self.hovered = contains(self.rect, x, y);
                self.pressed = self.hovered;
                false
            }
            InputEvent::MouseUp { x, y } => {
                self.hovered = contains(self.rect, x, y);
                let clicked = self.pressed && self.hovered;
                self.pressed = false;
                clicked
            }
            _ => false,
        }
    }

    fn draw<D: Display + ?Sized>(
        &self,
        display: &mut D,
        label: &str,
    ) {
        let bg = if self.pressed {
            COLOR_BUTTON_ACTIVE
        } else if self.hovered {
            COLOR_BUTTON_HOVER
        } else {
            COLOR_BUTTON
        };

        display.draw_rect(self.rect, bg);
        draw_outline(display, self.rect, COLOR_ACCENT_DIM);
        display.draw_text(self.rect.x + 8, self.rect.y + 7, label, COLOR_TEXT);
    }
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SettingsPanel {
    pub fn new(
        width: usize,
        height: usize,
        host: &str,
        port: u16,
        gain_db: f32,
    ) -> Self {
        let mut panel = Self {
            host: TextField::new("Host", 220, HOST_MAX_LEN, false),
            port: TextField::new("Port", 80, PORT_MAX_LEN, true),
            gain: Slider::new("Gain (dB)", GAIN_MIN_DB as i32, GAIN_MAX_DB as i32),
            connect: Button::new(),
            origin: (0, 0),
        };

        panel.sync(host, port, gain_db);
        panel.layout(width, height);
        panel
    }

    /// Центрирует панель в окне заданного размера.
    pub fn layout(
        &mut self,
        width: usize,
        height: usize,
    ) {
        let px = width.saturating_sub(PANEL_WIDTH) / 2;
        let py = height.saturating_sub(PANEL_HEIGHT) / 2;
        self.origin = (px, py);

        let x = px + PANEL_PADDING;
        let mut y = py + FIRST_WIDGET_Y;

        self.host.rect.x = x;
        self.host.rect.y = y;
        y += 50;
        self.port.rect.x = x;
        self.port.rect.y = y;
        y += 50;
        self.gain.rect.x = x;
        self.gain.rect.y = y;
        y += 45;
        self.connect.rect.x = x;
        self.connect.rect.y = y;
    }

    /// Обновляет поля извне (найден источник, изменено усиление клавишами).
    pub fn sync(
        &mut self,
        host: &str,
        port: u16,
        gain_db: f32,
    ) {
        self.host.set_text(host);
        self.port.set_text(&port.to_string());
        self.gain.set_value(gain_db.round() as i32);
    }

    pub fn set_gain(
        &mut self,
        gain_db: f32,
    ) {
        self.gain.set_value(gain_db.round() as i32);
    }

    /// Передаёт событие виджетам. Возвращает изменение, если оно было.
    pub fn handle_event(
        &mut self,
        event: &InputEvent,
    ) -> Option<SettingsAction> {
        if self.host.handle(event) {
            return Some(SettingsAction::HostChanged(self.host.text().to_string()));
        }

        if self.port.handle(event) {
            let port = match self.port.text().parse::<u16>() {
                Ok(p) if p > 0 => p,
                _ => DEFAULT_PORT,
            };
            return Some(SettingsAction::PortChanged(port));
        }

        if self.gain.handle(event) {
            return Some(SettingsAction::GainChanged(self.gain.value() as f32));
        }

        if self.connect.handle(event) {
            return Some(SettingsAction::ToggleConnection);
        }

        None
    }

    /// Фокус в текстовом поле: горячие клавиши не обрабатываются.
    pub fn is_text_focused(&self) -> bool {
        self.host.is_focused() || self.port.is_focused()
    }

    pub fn panel_rect(&self) -> Rect {
        Rect {
            x: self.origin.0,
            y: self.origin.1,
            w: PANEL_WIDTH,
            h: PANEL_HEIGHT,
        }
    }

    pub fn host(&self) -> &TextField {
        &self.host
    }

    pub fn port(&self) -> &TextField {
        &self.port
    }

    pub fn gain(&self) -> &Slider {
        &self.gain
    }

    pub fn connect_button(&self) -> &Button {
        &self.connect
    }

    pub fn draw<D: Display + ?Sized>(
        &self,
        display: &mut D,
        connected: bool,
    ) {
        let panel = self.panel_rect();
        display.draw_rect(panel, COLOR_BG_PANEL);
        draw_outline(display, panel, COLOR_ACCENT_DIM);
        display.draw_text(panel.x + PANEL_WIDTH / 2 - 28, panel.y + 10, "Settings", COLOR_ACCENT);

        let (status, color) = if connected {
            ("CONNECTED", COLOR_GREEN)
        } else {
            ("DISCONNECTED", COLOR_RED)
        };
        display.draw_text(panel.x + PANEL_PADDING, panel.y + PANEL_HEIGHT - 25, status, color);

        self.host.draw(display);
        self.port.draw(display);
        self.gain.draw(display);
        self.connect
            .draw(display, if connected { "Disconnect" } else { "Connect" });
    }
}
