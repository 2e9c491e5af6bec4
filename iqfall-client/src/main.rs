use std::{
    path::PathBuf,
    sync::{atomic::Ordering, Arc},
    time::{Duration, Instant},
};

use clap::Parser;
use iqfall_client::{
    clamp_window_size, ClientConfig, ClientMetrics, ClientOptions, Discovery, HeadlessDisplay,
    NullDiscovery, UdpDiscovery, WaterfallApp, CONFIG_FILE, DEFAULT_DISCOVERY_PORT,
    DEFAULT_NODE_ID,
};
use iqfall_types::{ByteOrderKind, ProtocolKind};
use log::{error, info, warn, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    name = "iqfall",
    version = env!("CARGO_PKG_VERSION"),
    about = "Real-time spectrum waterfall for a networked IQ stream",
    long_about = None,
)]
struct Cli {
    /// Адрес источника (по умолчанию из файла настроек)
    #[arg(long)]
    host: Option<String>,
    /// TCP порт источника
    #[arg(long)]
    port: Option<u16>,
    /// Тестовый сигнал вместо сети
    #[arg(long)]
    test_pattern: bool,
    /// Имя узла в объявлениях
    #[arg(long, default_value = DEFAULT_NODE_ID)]
    node_id: String,
    /// Отключить обнаружение источников
    #[arg(long)]
    no_discovery: bool,
    /// Не подключаться к найденным источникам автоматически
    #[arg(long)]
    no_auto: bool,
    /// Файл настроек
    #[arg(long, default_value = CONFIG_FILE)]
    config: PathBuf,
    /// Протокол: phxi, ft32, auto
    #[arg(long, default_value = "phxi")]
    protocol: String,
    /// Порядок байт: le, be
    #[arg(long, default_value = "le")]
    byte_order: String,
    /// Ширина окна, пикселей
    #[arg(long)]
    width: Option<usize>,
    /// Высота окна, пикселей
    #[arg(long)]
    height: Option<usize>,
    /// Периодически сохранять водопад в PNG
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Интервал снимков (секунды)
    #[arg(long, default_value = "1.0")]
    snapshot_interval: f64,
    /// UDP порт обнаружения
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    discovery_port: u16,
    /// Тихий режим (только ошибки)
    #[arg(short, long)]
    quiet: bool,
    /// Подробный вывод
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .format_target(false)
        .format_timestamp_secs()
        .init();

    let protocol: ProtocolKind = match cli.protocol.parse() {
        Ok(p) => p,
        Err(e) => {
            error!("--protocol: {e}");
            std::process::exit(1);
        }
    };

    let byte_order: ByteOrderKind = match cli.byte_order.parse() {
        Ok(o) => o,
        Err(e) => {
            error!("--byte-order: {e}");
            std::process::exit(1);
        }
    };

    if !(cli.snapshot_interval.is_finite() && cli.snapshot_interval > 0.0) {
        error!("--snapshot-interval must be positive, got {}", cli.snapshot_interval);
        std::process::exit(1);
    }

    let mut config = match ClientConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            warn!("Ignoring {:?}: {e}. Using defaults", cli.config);
            ClientConfig::default()
        }
    };

    // Аргументы командной строки важнее файла
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    let (width, height) = clamp_window_size(
        cli.width.unwrap_or(config.width),
        cli.height.unwrap_or(config.height),
    );
    config.width = width;
    config.height = height;

    let options = ClientOptions {
        node_id: cli.node_id,
        discovery_enabled: !cli.no_discovery,
        discovery_port: cli.discovery_port,
        auto_connect: !cli.no_auto,
        protocol,
        byte_order,
        test_pattern: cli.test_pattern,
        snapshot_path: cli.snapshot,
        snapshot_interval: Duration::from_secs_f64(cli.snapshot_interval),
        config_path: cli.config,
        ..ClientOptions::default()
    };

    let mut display = match HeadlessDisplay::new(config.width, config.height) {
        Ok(d) => d,
        Err(e) => {
            error!("Failed to allocate frame buffer: {e}");
            std::process::exit(1);
        }
    };
    if let Some(path) = &options.snapshot_path {
        display = display.with_snapshots(path, options.snapshot_interval);
    }

    let discovery: Box<dyn Discovery> = if options.discovery_enabled {
        Box::new(UdpDiscovery::new(&options.node_id, options.discovery_port))
    } else {
        Box::new(NullDiscovery)
    };

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Source        : {}", config.endpoint());
    info!("  Protocol      : {} ({})", options.protocol, options.byte_order);
    info!("  Window        : {}x{}", config.width, config.height);
    info!("  Gain offset   : {:+.1} dB", config.gain_db);
    if options.discovery_enabled {
        info!(
            "  Discovery     : UDP {} as {} (auto-connect: {})",
            options.discovery_port, options.node_id, options.auto_connect
        );
    } else {
        info!("  Discovery     : disabled");
    }
    info!("  Test pattern  : {}", if options.test_pattern { "on" } else { "off" });
    if let Some(path) = &options.snapshot_path {
        info!("  Snapshots     : {:?} every {:.1} s", path, cli.snapshot_interval);
    }
    info!("  Config        : {:?}", options.config_path);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("Keys: Tab settings, +/- gain, R reconnect, T test pattern, Q quit");

    let metrics: Arc<ClientMetrics> = ClientMetrics::new();

    let mut app = match WaterfallApp::new(config, options, display, discovery, metrics.clone()) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    let stop_ctrlc = app.stop_flag();

    if let Err(e) = ctrlc::set_handler(move || {
        if stop_ctrlc.swap(true, Ordering::SeqCst) {
            // Второй Ctrl+C: принудительный выход
            warn!("Force exit");
            std::process::exit(130);
        }
        warn!("Ctrl+C received, shutting down...");
    }) {
        warn!("Failed to set Ctrl+C handler: {e}");
    }

    let session_start = Instant::now();

    if let Err(e) = app.run() {
        error!("Waterfall stopped: {e}");
        std::process::exit(1);
    }

    let summary = metrics.summary(&session_start);
    info!("\n{summary}");

    if summary.dropped_frames > 0 {
        warn!(
            "⚠ {} frames lost ({:.2}%). Check the network path to the source",
            summary.dropped_frames, summary.frame_loss_pct
        );
    }

    info!("Last peak: {:.1} Hz", app.peak_frequency());
}
