//! Matching Engine - Core order matching algorithm.
//!
//! Implements the cross/rest algorithm:
//! 1. CROSSING: Match the incoming order against the best opposite order
//!    until it is used up or prices stop crossing
//! 2. RESTING: Place any remaining quantity in the book
//!
//! Buy- and sell-initiated orders run through the same routine with the
//! sides swapped.

use tracing::{debug, trace, warn};

use crate::arena::{Arena, OrderRecord};
use crate::command::{
    Instruction, InstructionKind, Notification, NotificationKind, OrderKey, RejectReason, Side,
};
use crate::notify::NotificationSink;
use crate::order_book::OrderBook;
use crate::registry::BookRegistry;

/// Execution price for a crossing buy/sell pair.
///
/// The midpoint, truncated toward the sell price.
#[inline]
pub fn trade_price(buy_price: u64, sell_price: u64) -> u64 {
    debug_assert!(buy_price >= sell_price, "prices do not cross");
    sell_price + (buy_price - sell_price) / 2
}

/// Running totals since the engine started
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatchStats {
    /// Number of fills (each fill notifies two parties)
    pub fills: u64,
    /// Sum of fill quantities
    pub filled_volume: u128,
    /// Successful cancels
    pub cancels: u64,
    /// Rejected instructions
    pub rejections: u64,
}

/// The matching engine core
pub struct MatchingEngine {
    /// Memory arena for order records
    pub arena: Arena,
    /// One order book per instrument
    pub books: BookRegistry,
    stats: MatchStats,
}

impl MatchingEngine {
    /// Create a new matching engine with a fixed arena of `capacity` orders
    pub fn new(capacity: u32) -> Self {
        Self::with_arena(Arena::new(capacity))
    }

    pub fn with_arena(arena: Arena) -> Self {
        Self {
            arena,
            books: BookRegistry::new(),
            stats: MatchStats::default(),
        }
    }

    /// Process one instruction to completion, reporting every outcome to
    /// `sink`.
    pub fn process<S: NotificationSink + ?Sized>(&mut self, instruction: Instruction, sink: &mut S) {
        trace!(?instruction, "intake");
        match instruction.kind {
            InstructionKind::Buy => self.process_order(instruction, Side::Buy, sink),
            InstructionKind::Sell => self.process_order(instruction, Side::Sell, sink),
            InstructionKind::Cancel => self.process_cancel(instruction, sink),
        }
    }

    /// Process a buy or sell.
    ///
    /// # Algorithm
    /// 1. Reject an identity that is already resting in this book
    /// 2. Allocate a record (reject if the arena is exhausted)
    /// 3. Cross against the opposite side
    /// 4. Rest what is left, or free the record if nothing is
    fn process_order<S: NotificationSink + ?Sized>(
        &mut self,
        instruction: Instruction,
        side: Side,
        sink: &mut S,
    ) {
        let key = instruction.key();

        if self.books.get_or_create(instruction.instrument_id).contains(key) {
            warn!(%key, instrument = instruction.instrument_id, "duplicate identity");
            self.reject(&instruction, RejectReason::DuplicateIdentity, sink);
            return;
        }

        let record = OrderRecord::new(
            key,
            instruction.instrument_id,
            side,
            instruction.price,
            instruction.quantity,
        );
        let incoming = match self.arena.alloc(record) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(%key, error = %err, "order rejected");
                self.reject(&instruction, RejectReason::ArenaExhausted, sink);
                return;
            }
        };

        let arena = &mut self.arena;
        let book = self.books.get_or_create(instruction.instrument_id);
        let stats = &mut self.stats;
        let opposite = side.opposite();

        // Phase 1: CROSSING
        while !arena.get(incoming).is_filled() {
            let Some(resting) = book.side(opposite).peek_best() else {
                break;
            };

            let (buy, sell) = match side {
                Side::Buy => (incoming, resting),
                Side::Sell => (resting, incoming),
            };
            let (buy_price, sell_price) = (arena.get(buy).price, arena.get(sell).price);
            if buy_price < sell_price {
                break;
            }

            let price = trade_price(buy_price, sell_price);
            let quantity = arena
                .get(incoming)
                .quantity()
                .min(arena.get(resting).quantity());

            book.side_mut(opposite).fill(arena, resting, quantity);
            arena.get_mut(incoming).fill(quantity);

            stats.fills += 1;
            stats.filled_volume += u128::from(quantity);
            debug!(
                instrument = instruction.instrument_id,
                buyer = %arena.get(buy).key,
                seller = %arena.get(sell).key,
                price,
                quantity,
                "fill"
            );

            sink.notify(fill_notification(arena.get(buy), price, quantity));
            sink.notify(fill_notification(arena.get(sell), price, quantity));

            if arena.get(resting).is_filled() {
                book.side_mut(opposite).remove(arena, resting);
                arena.free(resting);
            }
        }

        // Phase 2: RESTING
        if arena.get(incoming).is_filled() {
            arena.free(incoming);
        } else {
            book.side_mut(side).push(arena, incoming);
        }
    }

    /// Process a cancel.
    ///
    /// Answers CANCELLED with the unfilled quantity if the identity was
    /// resting, NOT_CANCELLED otherwise. Never creates a book.
    fn process_cancel<S: NotificationSink + ?Sized>(&mut self, instruction: Instruction, sink: &mut S) {
        let key = instruction.key();

        let cancelled = match self.books.get_mut(instruction.instrument_id) {
            Some(book) => book.cancel(&mut self.arena, key),
            None => None,
        };

        let notification = match cancelled {
            Some(handle) => {
                let record = self.arena.free(handle);
                self.stats.cancels += 1;
                debug!(%key, instrument = instruction.instrument_id, remaining = record.quantity(), "cancelled");
                Notification {
                    trader_id: key.trader_id,
                    kind: NotificationKind::Cancelled,
                    trade_id: key.trade_id,
                    instrument_id: instruction.instrument_id,
                    price: record.price,
                    quantity: record.quantity(),
                }
            }
            None => {
                debug!(%key, instrument = instruction.instrument_id, "nothing to cancel");
                Notification {
                    trader_id: key.trader_id,
                    kind: NotificationKind::NotCancelled,
                    trade_id: key.trade_id,
                    instrument_id: instruction.instrument_id,
                    price: 0,
                    quantity: 0,
                }
            }
        };
        sink.notify(notification);
    }

    fn reject<S: NotificationSink + ?Sized>(
        &mut self,
        instruction: &Instruction,
        reason: RejectReason,
        sink: &mut S,
    ) {
        self.stats.rejections += 1;
        sink.notify(Notification::rejected(instruction, reason));
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    #[inline]
    pub fn stats(&self) -> MatchStats {
        self.stats
    }

    /// Book for an instrument, if one has been created
    #[inline]
    pub fn book(&self, instrument_id: u64) -> Option<&OrderBook> {
        self.books.get(instrument_id)
    }

    #[inline]
    pub fn best_bid(&self, instrument_id: u64) -> Option<u64> {
        self.book(instrument_id).and_then(OrderBook::best_bid)
    }

    #[inline]
    pub fn best_ask(&self, instrument_id: u64) -> Option<u64> {
        self.book(instrument_id).and_then(OrderBook::best_ask)
    }

    /// Resting record for an identity
    pub fn resting_order(&self, instrument_id: u64, key: OrderKey) -> Option<&OrderRecord> {
        let book = self.book(instrument_id)?;
        let side = book.locate(key)?;
        book.side(side).get(key).map(|handle| self.arena.get(handle))
    }

    /// Total resting orders across all instruments
    #[inline]
    pub fn order_count(&self) -> usize {
        self.books.resting_orders()
    }

    /// Every allocated record is resting in some book, and the arena's
    /// alloc/free counters agree with its live count.
    pub fn is_consistent(&self) -> bool {
        let live = self.arena.total_allocations() - self.arena.total_frees();
        live == u64::from(self.arena.allocated())
            && self.arena.allocated() as usize == self.books.resting_orders()
    }

    /// Warm up the engine (pre-fault memory pages)
    pub fn warm_up(&mut self) {
        self.arena.warm_up();
    }

    /// Compute a hash of the current state (for determinism testing)
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();

        for book in self.books.iter() {
            book.instrument_id().hash(&mut hasher);
            for side in [&book.bids, &book.asks] {
                for level in side.levels() {
                    level.hash(&mut hasher);
                }
            }
        }
        self.arena.allocated().hash(&mut hasher);
        self.stats.filled_volume.hash(&mut hasher);

        hasher.finish()
    }
}

fn fill_notification(record: &OrderRecord, price: u64, quantity: u64) -> Notification {
    Notification {
        trader_id: record.key.trader_id,
        kind: if record.is_filled() {
            NotificationKind::Full
        } else {
            NotificationKind::Partial
        },
        trade_id: record.key.trade_id,
        instrument_id: record.instrument_id,
        price,
        quantity,
    }
}
