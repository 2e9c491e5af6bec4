pub mod error;
pub mod header;
pub mod iq_sample;
pub mod sample_format;

pub use error::*;
pub use header::*;
pub use iq_sample::*;
pub use sample_format::*;
