//! Тестовый источник IQ потока.
//!
//! TCP сервер, отдающий синтетический тон по протоколу PHXI (любой формат
//! выборок, необязательные META кадры) или FT32. Умеет выдерживать темп
//! реального времени, пропускать номера кадров и обрывать соединение, что
//! удобно для проверки клиента.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pacing;
pub mod session;
pub mod signal;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use pacing::*;
pub use session::*;
pub use signal::*;
