pub mod config;
pub mod error;
pub mod service;

pub use config::{Cli, Command, Role};
pub use error::{Error, Result};
pub use service::SwitcherService;
