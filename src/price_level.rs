//! Price Level - A FIFO queue of orders at a single price point.
//!
//! Implements a doubly-linked list threaded through arena records
//! for O(1) insertion, removal from head, and removal from arbitrary
//! position.

use crate::arena::{Arena, OrderHandle};

/// A queue of orders at a specific price level.
///
/// Orders are processed in FIFO order (price-time priority).
/// The doubly-linked structure enables O(1) cancel from any position.
#[derive(Clone, Copy, Debug, Default)]
pub struct PriceLevel {
    /// Oldest order (highest priority, first to match)
    pub head: Option<OrderHandle>,
    /// Newest order (last to match)
    pub tail: Option<OrderHandle>,
    /// Total quantity across all orders at this level; wider than a
    /// single order so any number of valid orders fit
    pub total_qty: u128,
    /// Number of orders at this level
    pub count: u32,
}

impl PriceLevel {
    /// Create a new empty price level
    #[inline]
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            total_qty: 0,
            count: 0,
        }
    }

    /// Returns true if there are no orders at this level
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Append an order to the tail of the queue (newest order).
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn push_back(&mut self, arena: &mut Arena, handle: OrderHandle) {
        let qty = arena.get(handle).quantity();

        match self.tail {
            None => {
                // Empty list: new node becomes both head and tail
                debug_assert!(self.head.is_none());
                self.head = Some(handle);
            }
            Some(tail) => {
                arena.get_mut(tail).next = Some(handle);
            }
        }

        let node = arena.get_mut(handle);
        node.prev = self.tail;
        node.next = None;
        self.tail = Some(handle);

        self.count += 1;
        self.total_qty += u128::from(qty);
    }

    /// Remove an order from anywhere in the queue.
    ///
    /// Handles all edge cases:
    /// - Only node in level (head == tail)
    /// - Removing head
    /// - Removing tail
    /// - Removing from middle
    ///
    /// # Returns
    /// `true` if the level is now empty, `false` otherwise.
    /// The order is NOT freed from the arena; caller must do that.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn remove(&mut self, arena: &mut Arena, handle: OrderHandle) -> bool {
        let node = arena.get(handle);
        let prev = node.prev;
        let next = node.next;
        let qty = node.quantity();

        match prev {
            Some(prev) => arena.get_mut(prev).next = next,
            None => {
                debug_assert_eq!(self.head, Some(handle));
                self.head = next;
            }
        }
        match next {
            Some(next) => arena.get_mut(next).prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(handle));
                self.tail = prev;
            }
        }

        self.count -= 1;
        self.total_qty -= u128::from(qty);

        // Clear the removed node's linkage
        let node = arena.get_mut(handle);
        node.prev = None;
        node.next = None;

        self.count == 0
    }

    /// Peek at the head order without removing it.
    #[inline]
    pub const fn peek_head(&self) -> Option<OrderHandle> {
        self.head
    }

    /// Update total quantity after a partial fill.
    ///
    /// Call this after reducing an order's quantity directly.
    #[inline]
    pub fn subtract_qty(&mut self, qty: u64) {
        let qty = u128::from(qty);
        debug_assert!(self.total_qty >= qty);
        self.total_qty -= qty;
    }

    /// Walk the queue from oldest to newest.
    pub fn iter<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = OrderHandle> + 'a {
        std::iter::successors(self.head, move |&h| arena.get(h).next)
    }
}
