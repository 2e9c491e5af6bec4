//! Главный цикл клиента.
//!
//! Один тик:
//! 1. событие обнаружения источника;
//! 2. таймер автоматического переподключения;
//! 3. события ввода;
//! 4. чтение не более одного кадра (или порции тестового сигнала);
//! 5. спектр → АРУ → строка водопада, если накопилось достаточно выборок;
//! 6. вывод кадра с оверлеем.
//!
//! Всё состояние принадлежит [`WaterfallApp`]; единственный внешний поток:
//! слушатель обнаружения, он общается с циклом через одноместный канал.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use iqfall_dsp::{status_color, status_indicator_rect, WaterfallPipeline, DISPLAY_SAMPLE_RATE};
use log::{debug, info, warn};

use crate::{
    config::{clamp_window_size, ClientConfig, ClientOptions, GAIN_MAX_DB, GAIN_MIN_DB, GAIN_STEP_DB},
    connection::{ConnectionManager, PollOutcome},
    discovery::Discovery,
    display::{Display, InputEvent, Key},
    metrics::ClientMetrics,
    settings::{SettingsAction, SettingsPanel},
    test_pattern::TestPattern,
    ClientResult,
};

/// Пауза, когда рисовать нечего
const IDLE_SLEEP: Duration = Duration::from_millis(10);
/// Пауза при открытой панели без новых данных (~60 кадров/с)
const PANEL_SLEEP: Duration = Duration::from_millis(16);

const STATUS_TEXT_POS: (usize, usize) = (5, 5);
const STATUS_TEXT_RGB: [u8; 3] = [0xE8, 0xE8, 0xE8];

/// Что произошло за тик.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Добавлена строка водопада
    pub row_drawn: bool,
    /// Кадр выведен на экран
    pub rendered: bool,
}

pub struct WaterfallApp<D: Display> {
    config: ClientConfig,
    options: ClientOptions,
    display: D,
    pipeline: WaterfallPipeline,
    connection: ConnectionManager,
    discovery: Box<dyn Discovery>,
    settings: SettingsPanel,
    test_pattern: Option<TestPattern>,
    show_settings: bool,
    dirty: bool,
    seen_dropped_pairs: u64,
    stop_flag: Arc<AtomicBool>,
    metrics: Arc<ClientMetrics>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<D: Display> WaterfallApp<D> {
    /// Собирает клиента. Размер водопада берётся из `display`.
    ///
    /// Ошибка выделения буферов здесь фатальна.
    pub fn new(
        config: ClientConfig,
        options: ClientOptions,
        display: D,
        discovery: Box<dyn Discovery>,
        metrics: Arc<ClientMetrics>,
    ) -> ClientResult<Self> {
        let mut config = config;
        config.gain_db = config.gain_db.clamp(GAIN_MIN_DB, GAIN_MAX_DB);

        let (width, height) = display.size();
        let mut pipeline = WaterfallPipeline::new(width, height)?;
        pipeline.set_gain_offset(config.gain_db);

        let connection = ConnectionManager::new(&config.host, config.port, &options, metrics.clone());
        let settings = SettingsPanel::new(width, height, &config.host, config.port, config.gain_db);

        let test_pattern = if options.test_pattern {
            pipeline.configure_stream(DISPLAY_SAMPLE_RATE);
            Some(TestPattern::new())
        } else {
            None
        };

        Ok(Self {
            config,
            options,
            display,
            pipeline,
            connection,
            discovery,
            settings,
            test_pattern,
            show_settings: false,
            dirty: true,
            seen_dropped_pairs: 0,
            stop_flag: Arc::new(AtomicBool::new(false)),
            metrics,
        })
    }

    /// Флаг остановки главного цикла (Ctrl+C, выход по клавише).
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    /// Запускает обнаружение. Сбой не фатален: клиент работает с
    /// настроенным адресом.
    pub fn start(&mut self) {
        if let Err(e) = self.discovery.start() {
            warn!("Discovery init failed: {e}");
        }
    }

    /// Крутит цикл до установки флага остановки, затем освобождает ресурсы.
    pub fn run(&mut self) -> ClientResult<()> {
        self.start();

        while !self.stop_flag.load(Ordering::Relaxed) {
            let report = self.tick(Instant::now())?;

            if !report.row_drawn {
                thread::sleep(if report.rendered { PANEL_SLEEP } else { IDLE_SLEEP });
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Один проход главного цикла.
    pub fn tick(
        &mut self,
        now: Instant,
    ) -> ClientResult<TickReport> {
        self.consume_discovery(now);

        if self.test_pattern.is_none() && self.connection.reconnect_due(now) {
            self.connect(now);
        }

        for event in self.display.poll_events() {
            self.handle_event(event, now);
        }

        self.acquire(now);

        let row_drawn = self.pipeline.process_if_ready();
        if row_drawn {
            self.metrics.spectral_rows.fetch_add(1, Ordering::Relaxed);
        }

        let rendered = row_drawn || self.show_settings || self.dirty;
        if rendered {
            self.render(now);
        }

        Ok(TickReport {
            row_drawn,
            rendered,
        })
    }

    /// Закрывает соединение и останавливает обнаружение, сохраняет
    /// настройки.
    pub fn shutdown(&mut self) {
        self.save_config();
        self.connection.disconnect(Instant::now());
        self.discovery.shutdown();
    }

    fn consume_discovery(
        &mut self,
        now: Instant,
    ) {
        if self.connection.is_connected() {
            return;
        }

        let Some(peer) = self.discovery.take_discovered() else {
            return;
        };

        self.config.host = peer.host;
        self.config.port = peer.data_port;
        self.connection.set_endpoint(&self.config.host, self.config.port);
        self.settings
            .sync(&self.config.host, self.config.port, self.config.gain_db);
        self.dirty = true;

        if self.options.auto_connect && self.test_pattern.is_none() {
            info!("Auto-connecting to discovered {} at {}", peer.id, self.config.endpoint());
            self.connect(now);
        } else {
            info!(
                "Updated connection fields to {} (auto-connect disabled)",
                self.config.endpoint()
            );
        }
    }

    fn connect(
        &mut self,
        now: Instant,
    ) {
        // Ошибка уже залогирована и показана в строке состояния
        if let Ok(info) = self.connection.connect(now) {
            self.pipeline.configure_stream(info.sample_rate);
            self.seen_dropped_pairs = 0;
        }
        self.dirty = true;
    }

    fn acquire(
        &mut self,
        now: Instant,
    ) {
        if let Some(pattern) = self.test_pattern.as_mut() {
            for _ in 0..pattern.due(now) {
                self.pipeline.push_iq(pattern.next_sample());
            }
            return;
        }

        if !self.connection.is_connected() {
            return;
        }

        let order = self.connection.byte_order();
        let pipeline = &mut self.pipeline;
        let outcome = self.connection.poll(now, |frame| {
            pipeline.ingest(frame.format, order, frame.payload);
        });

        match outcome {
            Ok(PollOutcome::Idle) => {}
            Ok(PollOutcome::Samples { .. }) => self.account_dropped_pairs(),
            Ok(PollOutcome::Meta(_)) | Ok(PollOutcome::StreamChanged(_)) | Err(_) => {
                self.dirty = true;
            }
        }
    }

    fn account_dropped_pairs(&mut self) {
        let total = self.pipeline.dropped_pairs();

        if total > self.seen_dropped_pairs {
            self.metrics
                .dropped_pairs
                .fetch_add(total - self.seen_dropped_pairs, Ordering::Relaxed);
        }
        self.seen_dropped_pairs = total;
    }

    fn handle_event(
        &mut self,
        event: InputEvent,
        now: Instant,
    ) {
        match &event {
            InputEvent::Quit => {
                self.stop_flag.store(true, Ordering::Relaxed);
                return;
            }
            InputEvent::Resize { width, height } => {
                self.resize(*width, *height);
                return;
            }
            InputEvent::Key(key) if !(self.show_settings && self.settings.is_text_focused()) => {
                self.handle_key(*key, now);
            }
            _ => {}
        }

        if !self.show_settings {
            return;
        }

        if let Some(action) = self.settings.handle_event(&event) {
            self.apply_settings(action, now);
        }
    }

    fn handle_key(
        &mut self,
        key: Key,
        now: Instant,
    ) {
        match key {
            Key::Escape => {
                if self.show_settings {
                    self.show_settings = false;
                    self.dirty = true;
                } else {
                    self.stop_flag.store(true, Ordering::Relaxed);
                }
            }
            Key::Q => {
                if !self.show_settings {
                    self.stop_flag.store(true, Ordering::Relaxed);
                }
            }
            Key::Tab => {
                self.show_settings = !self.show_settings;
                self.dirty = true;
            }
            Key::Plus | Key::Equals | Key::KeypadPlus => self.adjust_gain(GAIN_STEP_DB),
            Key::Minus | Key::KeypadMinus => self.adjust_gain(-GAIN_STEP_DB),
            Key::R => {
                info!("Reconnecting to {}", self.connection.endpoint());
                self.connection.disconnect(now);
                if self.test_pattern.is_none() {
                    self.connect(now);
                }
            }
            Key::T => self.toggle_test_pattern(now),
            Key::Backspace | Key::Enter => {}
        }
    }

    fn toggle_test_pattern(
        &mut self,
        now: Instant,
    ) {
        if self.test_pattern.take().is_some() {
            info!("Test pattern off");
            self.connection.request_reconnect();
        } else {
            info!("Test pattern on, network input paused");
            self.connection.disconnect(now);
            self.pipeline.configure_stream(DISPLAY_SAMPLE_RATE);
            self.test_pattern = Some(TestPattern::new());
        }
        self.dirty = true;
    }

    fn adjust_gain(
        &mut self,
        delta_db: f32,
    ) {
        self.set_gain((self.config.gain_db + delta_db).clamp(GAIN_MIN_DB, GAIN_MAX_DB));
        self.settings.set_gain(self.config.gain_db);
        info!("Gain offset: {:+.1} dB", self.config.gain_db);
    }

    fn set_gain(
        &mut self,
        gain_db: f32,
    ) {
        self.config.gain_db = gain_db;
        self.pipeline.set_gain_offset(gain_db);
        self.save_config();
        self.dirty = true;
    }

    fn apply_settings(
        &mut self,
        action: SettingsAction,
        now: Instant,
    ) {
        match action {
            SettingsAction::HostChanged(host) => {
                self.config.host = host;
                self.connection.set_endpoint(&self.config.host, self.config.port);
            }
            SettingsAction::PortChanged(port) => {
                self.config.port = port;
                self.connection.set_endpoint(&self.config.host, self.config.port);
            }
            SettingsAction::GainChanged(gain_db) => self.set_gain(gain_db),
            SettingsAction::ToggleConnection => {
                if self.connection.is_connected() {
                    self.connection.disconnect(now);
                } else if self.test_pattern.is_none() {
                    self.connect(now);
                }
            }
        }

        self.save_config();
        self.dirty = true;
    }

    fn resize(
        &mut self,
        width: usize,
        height: usize,
    ) {
        let (width, height) = clamp_window_size(width, height);

        if let Err(e) = self.display.resize(width, height) {
            warn!("Resize to {width}x{height} failed: {e}");
            return;
        }

        // Прежние буферы остаются, пока не удастся выделить новые
        if let Err(e) = self.pipeline.resize(width, height) {
            warn!("Resize to {width}x{height} failed, frame skipped: {e}");
            return;
        }

        self.settings.layout(width, height);
        self.config.width = width;
        self.config.height = height;
        self.save_config();
        self.dirty = true;
    }

    fn render(
        &mut self,
        now: Instant,
    ) {
        let wf = self.pipeline.waterfall();
        let (width, height) = (wf.width(), wf.height());
        let connected = self.connection.is_connected();

        self.display.draw_waterfall(wf.pixels(), width, height);
        self.display
            .draw_rect(status_indicator_rect(width, height), status_color(connected));

        let status = if self.test_pattern.is_some() {
            "TEST PATTERN"
        } else {
            self.connection.status_text()
        };
        self.display
            .draw_text(STATUS_TEXT_POS.0, STATUS_TEXT_POS.1, status, STATUS_TEXT_RGB);

        if self.show_settings {
            self.settings.draw(&mut self.display, connected);
        }

        if let Err(e) = self.display.present(now) {
            warn!("Frame output failed: {e}");
        }
        self.dirty = false;
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save(&self.options.config_path) {
            warn!("Cannot save config to {:?}: {e}", self.options.config_path);
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn pipeline(&self) -> &WaterfallPipeline {
        &self.pipeline
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn settings_visible(&self) -> bool {
        self.show_settings
    }

    pub fn test_pattern_active(&self) -> bool {
        self.test_pattern.is_some()
    }

    /// Частота самого сильного бина последнего спектра.
    pub fn peak_frequency(&self) -> f32 {
        let analyzer = self.pipeline.analyzer();
        let hz = analyzer.bin_frequency(analyzer.peak_bin());
        debug!("Peak bin frequency: {hz:.1} Hz");
        hz
    }
}
