//! Book Registry - instrument id to order book.
//!
//! Books are created on first use and live as long as the engine.

use rustc_hash::FxHashMap;

use crate::order_book::OrderBook;

#[derive(Debug, Default)]
pub struct BookRegistry {
    books: FxHashMap<u64, OrderBook>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing book for `instrument_id`, or a fresh empty one.
    #[inline]
    pub fn get_or_create(&mut self, instrument_id: u64) -> &mut OrderBook {
        self.books
            .entry(instrument_id)
            .or_insert_with(|| OrderBook::new(instrument_id))
    }

    #[inline]
    pub fn get(&self, instrument_id: u64) -> Option<&OrderBook> {
        self.books.get(&instrument_id)
    }

    #[inline]
    pub fn get_mut(&mut self, instrument_id: u64) -> Option<&mut OrderBook> {
        self.books.get_mut(&instrument_id)
    }

    /// Number of instruments with a book
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Resting orders across every book
    pub fn resting_orders(&self) -> usize {
        self.books.values().map(OrderBook::order_count).sum()
    }

    /// Books in ascending instrument order
    pub fn iter(&self) -> impl Iterator<Item = &OrderBook> {
        let mut books: Vec<_> = self.books.values().collect();
        books.sort_unstable_by_key(|book| book.instrument_id());
        books.into_iter()
    }
}
