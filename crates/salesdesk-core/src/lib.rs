pub mod config;
pub mod error;
pub mod types;

pub use config::SalesdeskConfig;
pub use error::{Result, SalesdeskError};
pub use types::*;
