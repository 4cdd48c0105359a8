//! Shared basics for the PRTG crates
//!
//! - layered configuration loading (defaults, file, environment)
//! - logging setup with the bracketed-level console format

pub mod config_loader;
pub mod error;
pub mod logging;

pub use config_loader::{load_config_from_file, load_layered};
pub use error::{CommonError, Result};
pub use logging::{init_logging, LoggingConfig};
