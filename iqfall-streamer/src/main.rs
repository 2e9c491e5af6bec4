use std::sync::atomic::Ordering;

use clap::Parser;
use iqfall_streamer::{
    parse_freq_hz, parse_rate_hz, StreamSession, StreamerConfig, DEFAULT_STREAM_PORT,
};
use iqfall_types::{ByteOrderKind, ProtocolKind, SampleFormat};
use log::{error, info, warn, LevelFilter};

#[derive(Parser, Debug)]
#[command(
    name = "iqfall-streamer",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serve a synthetic IQ tone over TCP (PHXI or FT32)",
    long_about = None,
)]
struct Cli {
    /// Адрес прослушивания
    #[arg(long, default_value_t = format!("0.0.0.0:{DEFAULT_STREAM_PORT}"))]
    bind: String,
    /// Протокол: phxi, ft32
    #[arg(long, default_value = "phxi")]
    protocol: String,
    /// Порядок байт: le, be
    #[arg(long, default_value = "le")]
    byte_order: String,
    /// Частота дискретизации (например 2MHz)
    #[arg(long, default_value = "2MHz", value_parser = parse_rate_hz)]
    rate: u64,
    /// Формат выборок: int16, float32, uint8
    #[arg(long, default_value = "int16")]
    format: String,
    /// Несущая частота (только для заголовка и META)
    #[arg(long, default_value = "100MHz", value_parser = parse_rate_hz)]
    center_freq: u64,
    /// Смещение тона от несущей
    #[arg(long, default_value = "1kHz", value_parser = parse_freq_hz, allow_hyphen_values = true)]
    tone: f64,
    /// Амплитуда тона
    #[arg(long, default_value_t = 0.5)]
    amplitude: f32,
    /// Амплитуда шума
    #[arg(long, default_value_t = 0.0)]
    noise: f32,
    /// IQ пар в кадре
    #[arg(long, default_value_t = 16_384)]
    frame_samples: u32,
    /// Остановиться после N кадров на клиента
    #[arg(long)]
    frames: Option<u64>,
    /// Отдавать без выдержки темпа
    #[arg(long)]
    no_pace: bool,
    /// Множитель скорости
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    /// META кадр каждые N кадров
    #[arg(long)]
    meta_every: Option<u64>,
    /// Пропустить номер перед кадром с этим индексом
    #[arg(long)]
    skip_at: Option<u64>,
    /// Оборвать соединение после N кадров
    #[arg(long)]
    close_after: Option<u64>,
    /// Обслужить N клиентов и выйти
    #[arg(long)]
    clients: Option<u64>,
    /// Ослабление усиления, десятые доли дБ
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    gain_reduction: i32,
    /// Зерно генератора шума
    #[arg(long, default_value_t = 0x1F_A11)]
    seed: u64,
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

    let sample_format: SampleFormat = match cli.format.parse() {
        Ok(f) => f,
        Err(e) => {
            error!("--format: {e}");
            std::process::exit(1);
        }
    };

    let Ok(sample_rate) = u32::try_from(cli.rate) else {
        error!("--rate: {} Hz does not fit the wire header", cli.rate);
        std::process::exit(1);
    };

    let config = StreamerConfig {
        bind_addr: cli.bind,
        protocol,
        byte_order,
        sample_rate,
        sample_format,
        center_freq: cli.center_freq,
        gain_reduction: cli.gain_reduction,
        tone_hz: cli.tone,
        amplitude: cli.amplitude,
        noise: cli.noise,
        frame_samples: cli.frame_samples,
        max_frames: cli.frames,
        realtime: !cli.no_pace,
        speed: cli.speed,
        meta_every: cli.meta_every,
        skip_sequence_at: cli.skip_at,
        close_after: cli.close_after,
        max_clients: cli.clients,
        seed: cli.seed,
        ..StreamerConfig::default()
    };

    let session = match StreamSession::bind(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to start: {e}");
            std::process::exit(1);
        }
    };

    let cfg = session.config();
    let listen = session
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| cfg.bind_addr.clone());

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  Listen        : {listen}");
    info!("  Protocol      : {} ({})", cfg.protocol, cfg.byte_order);
    info!("  Sample rate   : {:.3} MHz", cfg.sample_rate as f64 / 1e6);
    info!("  Format        : {}", cfg.sample_format);
    info!("  Center freq   : {:.3} MHz", cfg.center_freq as f64 / 1e6);
    info!("  Tone          : {:+.1} Hz @ {:.2}", cfg.tone_hz, cfg.amplitude);
    info!("  Frame         : {} pairs", cfg.frame_samples);
    if cfg.realtime {
        info!("  Pacing        : {}x real time", cfg.speed);
    } else {
        info!("  Pacing        : off");
    }
    if let Some(every) = cfg.meta_every {
        info!("  META          : every {every} frame(s)");
    }
    if let Some(at) = cfg.skip_sequence_at {
        info!("  Seq skip      : before frame {at}");
    }
    if let Some(n) = cfg.close_after {
        info!("  Close after   : {n} frame(s)");
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let stop_ctrlc = session.stop_flag();

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

    if let Err(e) = session.run() {
        error!("Streamer stopped: {e}");
        std::process::exit(1);
    }
}
