//! CSV instruction files for offline replay.
//!
//! Input rows: `kind,trader_id,trade_id,instrument_id,price,quantity` where
//! `kind` is `buy`, `sell` or `cancel` (any case) or its wire code. Price and
//! quantity may be left empty on cancels.

use serde::{Deserialize, Serialize};

use crate::command::{Instruction, InstructionKind, Notification, NotificationKind};

#[derive(Debug, Clone, Deserialize)]
pub struct InstructionRow {
    pub kind: String,
    pub trader_id: u32,
    pub trade_id: u32,
    pub instrument_id: u64,
    pub price: Option<u64>,
    pub quantity: Option<u64>,
}

impl InstructionRow {
    /// Typed instruction, or `None` if the kind is not understood.
    pub fn to_instruction(&self) -> Option<Instruction> {
        let kind = match self.kind.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => InstructionKind::Buy,
            "sell" | "s" => InstructionKind::Sell,
            "cancel" | "c" => InstructionKind::Cancel,
            other => InstructionKind::try_from(other.parse::<i32>().ok()?).ok()?,
        };

        Some(Instruction {
            kind,
            trader_id: self.trader_id,
            trade_id: self.trade_id,
            instrument_id: self.instrument_id,
            price: self.price.unwrap_or(0),
            quantity: self.quantity.unwrap_or(0),
        })
    }
}

/// Output row, one per notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRow {
    pub trader_id: u32,
    pub kind: &'static str,
    pub trade_id: u32,
    pub instrument_id: u64,
    pub price: u64,
    pub quantity: u64,
    /// Empty unless rejected
    pub reason: String,
}

impl From<&Notification> for NotificationRow {
    fn from(notification: &Notification) -> Self {
        let reason = match notification.kind {
            NotificationKind::Rejected(reason) => format!("{:?}", reason),
            _ => String::new(),
        };
        Self {
            trader_id: notification.trader_id,
            kind: notification.kind.label(),
            trade_id: notification.trade_id,
            instrument_id: notification.instrument_id,
            price: notification.price,
            quantity: notification.quantity,
            reason,
        }
    }
}
