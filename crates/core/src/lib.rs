pub mod channel;
pub mod config;
pub mod error;

pub use channel::*;
pub use config::Config;
pub use error::*;
