pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, SeedPolicy};
pub use error::NomadsError;
pub use types::*;
