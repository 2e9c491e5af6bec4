pub mod app;
pub mod config;
pub mod connection;
pub mod discovery;
pub mod display;
pub mod error;
pub mod metrics;
pub mod settings;
pub mod test_pattern;

pub use app::*;
pub use config::*;
pub use connection::*;
pub use discovery::*;
pub use display::*;
pub use error::*;
pub use metrics::*;
pub use settings::*;
pub use test_pattern::*;
