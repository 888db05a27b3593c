//! Order Book - Per-instrument limit order book.
//!
//! Each side keeps two views over the same arena records:
//! - price levels in a `BTreeMap`, best price at one end, FIFO inside a level
//! - an identity index (`OrderKey -> OrderHandle`) for O(1) cancel lookup
//!
//! Both views are updated together in `push` and `remove`; a record is
//! reachable from both or from neither.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::arena::{Arena, Membership, OrderHandle};
use crate::command::{OrderKey, Side};
use crate::price_level::PriceLevel;

/// Mapping from identity to arena handle for O(1) cancel lookup
pub type IdentityIndex = FxHashMap<OrderKey, OrderHandle>;

/// One side (bids or asks) of an order book.
pub struct BookSide {
    side: Side,
    /// Price levels, ascending by price
    levels: BTreeMap<u64, PriceLevel>,
    index: IdentityIndex,
}

impl BookSide {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            index: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    // ========================================================================
    // Order Management
    // ========================================================================

    /// Rest a pending record on this side, behind every order already
    /// resting at the same price.
    ///
    /// # Panics
    /// Panics if the record is not pending, belongs to the other side, or
    /// its identity is already resting here.
    pub fn push(&mut self, arena: &mut Arena, handle: OrderHandle) {
        let membership = arena.membership(handle);
        assert_eq!(
            membership,
            Membership::Pending,
            "pushing order {:?} in state {:?}",
            handle,
            membership
        );
        let record = arena.get(handle);
        assert_eq!(record.side, self.side, "order {} pushed onto the wrong side", record.key);
        let (key, price) = (record.key, record.price);

        if let Some(existing) = self.index.insert(key, handle) {
            panic!("identity {} already resting as {:?}", key, existing);
        }

        self.levels
            .entry(price)
            .or_insert_with(PriceLevel::new)
            .push_back(arena, handle);
        arena.set_membership(handle, Membership::Resting(self.side));
    }

    /// Highest-priority resting order, without removing it.
    #[inline]
    pub fn peek_best(&self) -> Option<OrderHandle> {
        self.best_level().and_then(|(_, level)| level.peek_head())
    }

    /// Take a resting record out of both the price levels and the
    /// identity index. The record goes back to `Pending`; the caller
    /// frees it.
    ///
    /// # Panics
    /// Panics if the record is not resting on this side or the two views
    /// disagree about it.
    pub fn remove(&mut self, arena: &mut Arena, handle: OrderHandle) {
        let membership = arena.membership(handle);
        assert_eq!(
            membership,
            Membership::Resting(self.side),
            "removing order {:?} in state {:?}",
            handle,
            membership
        );
        let record = arena.get(handle);
        let (key, price) = (record.key, record.price);

        match self.index.remove(&key) {
            Some(indexed) if indexed == handle => {}
            other => panic!("identity index holds {:?} for {}, expected {:?}", other, key, handle),
        }

        let Some(level) = self.levels.get_mut(&price) else {
            panic!("order {} rests at missing price level {}", key, price);
        };
        if level.remove(arena, handle) {
            self.levels.remove(&price);
        }
        arena.set_membership(handle, Membership::Pending);
    }

    /// Look up and remove a resting order by identity.
    ///
    /// Returns `None` if nothing with that identity rests here.
    pub fn cancel_by_identity(&mut self, arena: &mut Arena, key: OrderKey) -> Option<OrderHandle> {
        let handle = *self.index.get(&key)?;
        self.remove(arena, handle);
        Some(handle)
    }

    /// Reduce a resting order's quantity after a fill, keeping its level's
    /// aggregate in step.
    ///
    /// # Panics
    /// Panics if `qty` exceeds the order's remaining quantity.
    pub fn fill(&mut self, arena: &mut Arena, handle: OrderHandle, qty: u64) {
        debug_assert_eq!(arena.membership(handle), Membership::Resting(self.side));
        let record = arena.get_mut(handle);
        record.fill(qty);
        let price = record.price;

        let Some(level) = self.levels.get_mut(&price) else {
            panic!("order {:?} rests at missing price level {}", handle, price);
        };
        level.subtract_qty(qty);
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn best_level(&self) -> Option<(&u64, &PriceLevel)> {
        match self.side {
            Side::Buy => self.levels.last_key_value(),
            Side::Sell => self.levels.first_key_value(),
        }
    }

    /// Best price on this side (highest bid / lowest ask)
    #[inline]
    pub fn best_price(&self) -> Option<u64> {
        self.best_level().map(|(&price, _)| price)
    }

    /// `(total quantity, order count)` resting at `price`
    pub fn depth_at(&self, price: u64) -> (u128, u32) {
        self.levels
            .get(&price)
            .map(|l| (l.total_qty, l.count))
            .unwrap_or((0, 0))
    }

    /// Price levels from best to worst as `(price, total quantity, count)`
    pub fn levels(&self) -> Box<dyn Iterator<Item = (u64, u128, u32)> + '_> {
        let view = |(&price, level): (&u64, &PriceLevel)| (price, level.total_qty, level.count);
        match self.side {
            Side::Buy => Box::new(self.levels.iter().rev().map(view)),
            Side::Sell => Box::new(self.levels.iter().map(view)),
        }
    }

    /// Resting orders at `price` in time priority
    pub fn orders_at(&self, arena: &Arena, price: u64) -> Vec<OrderHandle> {
        self.levels
            .get(&price)
            .map(|level| level.iter(arena).collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn get(&self, key: OrderKey) -> Option<OrderHandle> {
        self.index.get(&key).copied()
    }

    #[inline]
    pub fn contains(&self, key: OrderKey) -> bool {
        self.index.contains_key(&key)
    }

    /// Number of resting orders
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

impl std::fmt::Debug for BookSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookSide")
            .field("side", &self.side)
            .field("best", &self.best_price())
            .field("levels", &self.levels.len())
            .field("orders", &self.index.len())
            .finish()
    }
}

/// Both sides of the book for one instrument.
pub struct OrderBook {
    instrument_id: u64,
    /// Buy orders, highest price first
    pub bids: BookSide,
    /// Sell orders, lowest price first
    pub asks: BookSide,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(instrument_id: u64) -> Self {
        Self {
            instrument_id,
            bids: BookSide::new(Side::Buy),
            asks: BookSide::new(Side::Sell),
        }
    }

    #[inline]
    pub fn instrument_id(&self) -> u64 {
        self.instrument_id
    }

    #[inline]
    pub fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    #[inline]
    pub fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Which side an identity rests on, if any
    pub fn locate(&self, key: OrderKey) -> Option<Side> {
        if self.bids.contains(key) {
            Some(Side::Buy)
        } else if self.asks.contains(key) {
            Some(Side::Sell)
        } else {
            None
        }
    }

    /// Check if an identity rests on either side.
    #[inline]
    pub fn contains(&self, key: OrderKey) -> bool {
        self.locate(key).is_some()
    }

    /// Remove a resting order by identity from whichever side holds it.
    pub fn cancel(&mut self, arena: &mut Arena, key: OrderKey) -> Option<OrderHandle> {
        let side = self.locate(key)?;
        self.side_mut(side).cancel_by_identity(arena, key)
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Get the best bid price (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.best_price()
    }

    /// Get the best ask price (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<u64> {
        self.asks.best_price()
    }

    /// Calculate spread (best_ask - best_bid)
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    // ========================================================================
    // Utility Methods
    // ========================================================================

    /// Get the total number of orders in the book
    pub fn order_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Check if the book is empty
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Get depth at a price level
    pub fn depth_at(&self, side: Side, price: u64) -> (u128, u32) {
        self.side(side).depth_at(price)
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("instrument_id", &self.instrument_id)
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("bid_levels", &self.bids.level_count())
            .field("ask_levels", &self.asks.level_count())
            .field("order_count", &self.order_count())
            .finish()
    }
}
