use std::{
    fmt::Write as _,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use iqfall_types::{ByteOrderKind, ConfigError, ConfigResult, ProtocolKind};
use log::debug;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 4536;
pub const DEFAULT_WIDTH: usize = 1024;
pub const DEFAULT_HEIGHT: usize = 600;
pub const MIN_WIDTH: usize = 400;
pub const MIN_HEIGHT: usize = 300;

/// Файл настроек по умолчанию (в текущем каталоге).
pub const CONFIG_FILE: &str = "waterfall.ini";
pub const DEFAULT_NODE_ID: &str = "WATERFALL-1";
pub const DEFAULT_DISCOVERY_PORT: u16 = 5400;

pub const RECONNECT_INTERVAL: Duration = Duration::from_millis(5_000);
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Шаг регулировки усиления клавишами, дБ.
pub const GAIN_STEP_DB: f32 = 3.0;
pub const GAIN_MIN_DB: f32 = -30.0;
pub const GAIN_MAX_DB: f32 = 30.0;

/// Настройки, сохраняемые между запусками.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Хост источника
    pub host: String,
    /// TCP порт источника
    pub port: u16,
    /// Ширина окна, px
    pub width: usize,
    /// Высота окна, px
    pub height: usize,
    /// Смещение яркости водопада, дБ
    pub gain_db: f32,
}

/// Параметры запуска (не сохраняются в файл).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub node_id: String,
    pub discovery_enabled: bool,
    pub discovery_port: u16,
    /// Подключаться к найденному источнику автоматически
    pub auto_connect: bool,
    pub protocol: ProtocolKind,
    pub byte_order: ByteOrderKind,
    pub reconnect_interval: Duration,
    pub handshake_timeout: Duration,
    pub poll_timeout: Duration,
    /// Стартовать с тестовым сигналом вместо сети
    pub test_pattern: bool,
    /// Куда сохранять снимки водопада (PNG)
    pub snapshot_path: Option<PathBuf>,
    pub snapshot_interval: Duration,
    /// Путь к файлу настроек
    pub config_path: PathBuf,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ClientConfig {
    /// Разбирает файл формата `key=value`.
    ///
    /// Строки, начинающиеся с `;` или `#`, и неизвестные ключи
    /// пропускаются. Размеры окна не меньше 400×300.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut cfg = Self::default();

        for line in text.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                debug!("Config: skipping line without '=': {line}");
                continue;
            };

            let key = key.trim();
            let value = value.split_whitespace().next().unwrap_or("");

            match key {
                "host" => {
                    if value.is_empty() {
                        return Err(ConfigError::invalid_value(key, value));
                    }
                    cfg.host = value.to_string();
                }
                "port" => {
                    cfg.port = match value.parse::<u16>() {
                        Ok(p) if p > 0 => p,
                        _ => return Err(ConfigError::invalid_value(key, value)),
                    };
                }
                "width" => cfg.width = parse_num::<usize>(key, value)?.max(MIN_WIDTH),
                "height" => cfg.height = parse_num::<usize>(key, value)?.max(MIN_HEIGHT),
                "gain" => {
                    let gain = parse_num::<f32>(key, value)?;
                    if !gain.is_finite() {
                        return Err(ConfigError::invalid_value(key, value));
                    }
                    cfg.gain_db = gain;
                }
                other => debug!("Config: unknown key '{other}'"),
            }
        }

        Ok(cfg)
    }

    /// Читает файл. Отсутствующий файл: не ошибка: возвращаются значения
    /// по умолчанию.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(text) => {
                let cfg = Self::parse(&text)?;
                debug!("Loaded config from {:?}", path.as_ref());
                Ok(cfg)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> ConfigResult<()> {
        fs::write(path.as_ref(), self.to_ini())?;
        debug!("Saved config to {:?}", path.as_ref());
        Ok(())
    }

    pub fn to_ini(&self) -> String {
        let mut out = String::new();

        // Запись в String не может завершиться ошибкой
        let _ = writeln!(out, "; iqfall waterfall configuration");
        let _ = writeln!(out, "host={}", self.host);
        let _ = writeln!(out, "port={}", self.port);
        let _ = writeln!(out, "width={}", self.width);
        let _ = writeln!(out, "height={}", self.height);
        let _ = writeln!(out, "gain={:.1}", self.gain_db);

        out
    }

    /// `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_num<T: std::str::FromStr>(
    key: &str,
    value: &str,
) -> ConfigResult<T> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::invalid_value(key, value))
}

/// Ограничивает размер окна минимально допустимым.
pub fn clamp_window_size(
    width: usize,
    height: usize,
) -> (usize, usize) {
    (width.max(MIN_WIDTH), height.max(MIN_HEIGHT))
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для ClientConfig, ClientOptions
////////////////////////////////////////////////////////////////////////////////

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            gain_db: 0.0,
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            node_id: DEFAULT_NODE_ID.to_string(),
            discovery_enabled: true,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            auto_connect: true,
            protocol: ProtocolKind::Phxi,
            byte_order: ByteOrderKind::Little,
            reconnect_interval: RECONNECT_INTERVAL,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            poll_timeout: POLL_TIMEOUT,
            test_pattern: false,
            snapshot_path: None,
            snapshot_interval: Duration::from_secs(1),
            config_path: PathBuf::from(CONFIG_FILE),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
