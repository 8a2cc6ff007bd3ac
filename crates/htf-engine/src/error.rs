//! Engine error taxonomy
//!
//! Configuration errors fail fast at construction; sequencing errors are
//! explicit results. Data-quality problems (non-finite prices) are the
//! producing layer's responsibility and stay inert inside the engine.

use thiserror::Error;

use crate::timeframe::Timeframe;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Cannot aggregate {source} bars into {target}: target duration is not an exact multiple of the source")]
    UnsupportedAggregation { source: Timeframe, target: Timeframe },

    #[error("No active session for {symbol} {timeframe}")]
    SessionNotStarted { symbol: String, timeframe: Timeframe },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
