//! HTF Engine — bar aggregation and swing-structure detection
//!
//! The algorithmic core of the trading-analysis stack. Provides:
//! - a UTC-aligned timeframe calendar and exact-multiple bar aggregation
//!   with OHLC/volume conservation
//! - ring-buffer based, non-repainting swing-high/low detection with
//!   configurable left/right/confirm windows
//! - discount/equilibrium/premium classification of a price within a
//!   swing range
//!
//! Provider adapters, caching and presentation live elsewhere; this crate
//! is pure, synchronous computation over validated, UTC-normalized bars.

pub mod aggregate;
pub mod equilibrium;
pub mod error;
pub mod ring;
pub mod swing;
pub mod timeframe;
pub mod tracker;
pub mod types;

// Re-exports for convenience
pub use aggregate::BarAggregator;
pub use equilibrium::{classify, EquilibriumConfig};
pub use error::{EngineError, EngineResult};
pub use ring::RingBuffer;
pub use swing::{SwingConfig, SwingDetector};
pub use timeframe::Timeframe;
pub use tracker::{StructureKey, StructureTracker};
pub use types::{Bar, EquilibriumLevel, RawBar, SwingKind, SwingPoint, Zone};
