//! Error types for the PVSRA momentum strategy

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Market data error: {message}")]
    MarketData { message: String },

    #[error("Account error: {message}")]
    Account { message: String },

    #[error("Execution error: {message}")]
    Execution { message: String },

    #[error("Shutdown requested")]
    Cancelled,
}

impl EngineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn market_data(message: impl Into<String>) -> Self {
        Self::MarketData {
            message: message.into(),
        }
    }

    pub fn account(message: impl Into<String>) -> Self {
        Self::Account {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
