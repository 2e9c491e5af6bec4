//! Wire-протокол потока IQ выборок.
//!
//! Два варианта протокола поверх TCP: полный PHXI (заголовок потока,
//! кадры IQDQ и META, форматы Int16/Float32/UInt8) и упрощённый FT32
//! (кадры DATA, только Float32). Клиент выбирает вариант явно или
//! определяет его по первому слову потока.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use std::net::TcpStream;
//!
//! use iqfall_core::{open_codec, Frame};
//! use iqfall_types::{ByteOrderKind, ProtocolKind};
//!
//! let stream = TcpStream::connect("localhost:4536")?;
//! let (mut codec, info) = open_codec(ProtocolKind::Auto, stream, ByteOrderKind::Little)?;
//! println!("{} Hz {}", info.sample_rate, info.sample_format);
//!
//! if let Frame::Samples(frame) = codec.next_frame()? {
//!     println!("seq={} n={}", frame.header.sequence, frame.header.sample_count);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binary;
pub mod codec;
pub mod format;
pub mod normalize;
pub mod reader;
pub mod sequence;

pub use binary::*;
pub use codec::*;
pub use format::*;
pub use normalize::*;
pub use reader::*;
pub use sequence::*;

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
