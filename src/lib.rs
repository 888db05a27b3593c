//! # Slab-Matcher
//!
//! An in-memory, price-time priority order matching engine.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: One thread owns every book and the arena (no locks)
//! - **Arena Allocation**: Order records live in a recycled slab with
//!   generation-checked handles
//! - **Dual Index**: Each book side is ordered by price for matching and
//!   hashed by identity for cancels
//! - **Deterministic**: The same instruction sequence always yields the same
//!   notifications and book state
//!
//! ## Architecture
//!
//! ```text
//! [Sessions] --> [Bounded Queue] --> [Engine Thread (optionally pinned)]
//!     ^                                          |
//!     +--------- [Session Registry] <-- [Notifications]
//! ```

pub mod arena;
pub mod client;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
pub mod notify;
pub mod order_book;
pub mod price_level;
pub mod registry;
pub mod replay;
pub mod server;
pub mod wire;

// Re-exports for convenience
pub use arena::{Arena, Membership, OrderHandle, OrderRecord, NULL_INDEX};
pub use command::{
    Instruction, InstructionKind, Notification, NotificationKind, OrderKey, RejectReason, Side,
};
pub use config::{EngineConfig, ServerConfig};
pub use engine::{Engine, EngineHandle};
pub use error::{ArenaError, ConfigError, EngineError, WireError};
pub use matching::{trade_price, MatchStats, MatchingEngine};
pub use notify::{DiscardSink, NotificationSink};
pub use order_book::{BookSide, OrderBook};
pub use price_level::PriceLevel;
pub use registry::BookRegistry;
