//! Instruction and Notification types for the matching engine.
//!
//! Instructions are inputs from the session layer.
//! Notifications are outputs addressed to a single trader.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Identity of one order: the trader that sent it and that trader's
/// own sequence number for it.
///
/// Ordered by trader first, then trade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OrderKey {
    pub trader_id: u32,
    pub trade_id: u32,
}

impl OrderKey {
    #[inline]
    pub const fn new(trader_id: u32, trade_id: u32) -> Self {
        Self { trader_id, trade_id }
    }

    /// 64-bit packing: trader in the high half, trade in the low half.
    #[inline]
    pub const fn packed(self) -> u64 {
        ((self.trader_id as u64) << 32) | self.trade_id as u64
    }

    #[inline]
    pub const fn from_packed(packed: u64) -> Self {
        Self {
            trader_id: (packed >> 32) as u32,
            trade_id: packed as u32,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.trader_id, self.trade_id)
    }
}

// ============================================================================
// Input Instructions
// ============================================================================

/// What an instruction asks the engine to do
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionKind {
    Buy,
    Sell,
    Cancel,
}

impl InstructionKind {
    /// Wire code used by the packet payload.
    pub const fn code(self) -> i32 {
        match self {
            InstructionKind::Buy => 0,
            InstructionKind::Sell => 1,
            InstructionKind::Cancel => 2,
        }
    }
}

impl TryFrom<i32> for InstructionKind {
    type Error = EngineError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(InstructionKind::Buy),
            1 => Ok(InstructionKind::Sell),
            2 => Ok(InstructionKind::Cancel),
            other => Err(EngineError::UnsupportedKind(other)),
        }
    }
}

/// A single instruction for the engine.
///
/// `Cancel` only reads `trader_id`, `trade_id` and `instrument_id`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub trader_id: u32,
    pub trade_id: u32,
    pub instrument_id: u64,
    pub price: u64,
    pub quantity: u64,
}

impl Instruction {
    pub fn buy(trader_id: u32, trade_id: u32, instrument_id: u64, price: u64, quantity: u64) -> Self {
        Self {
            kind: InstructionKind::Buy,
            trader_id,
            trade_id,
            instrument_id,
            price,
            quantity,
        }
    }

    pub fn sell(trader_id: u32, trade_id: u32, instrument_id: u64, price: u64, quantity: u64) -> Self {
        Self {
            kind: InstructionKind::Sell,
            trader_id,
            trade_id,
            instrument_id,
            price,
            quantity,
        }
    }

    pub fn cancel(trader_id: u32, trade_id: u32, instrument_id: u64) -> Self {
        Self {
            kind: InstructionKind::Cancel,
            trader_id,
            trade_id,
            instrument_id,
            price: 0,
            quantity: 0,
        }
    }

    #[inline]
    pub const fn key(&self) -> OrderKey {
        OrderKey::new(self.trader_id, self.trade_id)
    }
}

// ============================================================================
// Output Notifications
// ============================================================================

/// Reasons for instruction rejection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RejectReason {
    /// The identity is already resting in this instrument's book
    DuplicateIdentity = 0,
    /// Arena is full
    ArenaExhausted = 1,
    /// Instruction kind code not understood
    UnsupportedKind = 2,
}

/// Outcome reported to a trader
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Filled, with quantity still resting
    Partial,
    /// Filled, nothing left
    Full,
    /// Resting order removed by request
    Cancelled,
    /// Nothing to cancel
    NotCancelled,
    /// Instruction refused
    Rejected(RejectReason),
}

impl NotificationKind {
    /// Wire code used by the packet payload.
    pub const fn code(self) -> i32 {
        match self {
            NotificationKind::NotCancelled => 3,
            NotificationKind::Partial => 4,
            NotificationKind::Full => 5,
            NotificationKind::Rejected(_) => 6,
            // Cancelled acknowledgements echo the CANCEL kind
            NotificationKind::Cancelled => 2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            NotificationKind::Partial => "PARTIAL",
            NotificationKind::Full => "FULL",
            NotificationKind::Cancelled => "CANCELLED",
            NotificationKind::NotCancelled => "NOT_CANCELLED",
            NotificationKind::Rejected(_) => "REJECTED",
        }
    }
}

/// A message for one trader about one of their orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient
    pub trader_id: u32,
    pub kind: NotificationKind,
    /// The recipient's own trade id for the affected order
    pub trade_id: u32,
    pub instrument_id: u64,
    /// Trade price for fills, resting price for cancels
    pub price: u64,
    /// Fill quantity for fills, remaining quantity for cancels
    pub quantity: u64,
}

impl Notification {
    pub fn rejected(instruction: &Instruction, reason: RejectReason) -> Self {
        Self {
            trader_id: instruction.trader_id,
            kind: NotificationKind::Rejected(reason),
            trade_id: instruction.trade_id,
            instrument_id: instruction.instrument_id,
            price: instruction.price,
            quantity: instruction.quantity,
        }
    }

    #[inline]
    pub const fn key(&self) -> OrderKey {
        OrderKey::new(self.trader_id, self.trade_id)
    }
}
