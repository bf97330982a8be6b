//! Bus layer errors
//!
//! A module that stays silent is not an error; exchanges classify silence in
//! their result instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BusResult<T> = Result<T, BusError>;
