//! Arena Allocator - O(1) slab allocator with generation-checked handles.
//!
//! The arena pre-allocates a contiguous block of slots at startup and
//! recycles them through a free list threaded through the unused slots.
//! Every slot carries a generation counter that is bumped on free, so a
//! handle that outlives its record is detected instead of silently
//! reading whatever order reused the slot. A slot whose generation
//! reaches `u32::MAX` is retired rather than reused, so a generation is
//! never handed out twice.

use std::fmt;

use crate::command::{OrderKey, Side};
use crate::error::ArenaError;

/// Sentinel value terminating the free list
pub const NULL_INDEX: u32 = u32::MAX;

/// Stable reference to a live order record.
///
/// Only valid until the record is freed; any later use panics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderHandle {
    index: u32,
    generation: u32,
}

impl OrderHandle {
    /// Slot position inside the arena
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Where a slot currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    /// On the free list
    Free,
    /// Allocated but not in any book (an incoming order while it crosses)
    Pending,
    /// Resting on one side of a book
    Resting(Side),
}

/// A single order as stored in the arena.
#[derive(Clone, Copy)]
pub struct OrderRecord {
    /// Trader/trade identity (cancellation key)
    pub key: OrderKey,

    /// Limit price
    pub price: u64,

    /// Remaining quantity to fill
    quantity: u64,

    pub instrument_id: u64,

    pub side: Side,

    // === Linkage (FIFO queue within a PriceLevel) ===
    /// Next (younger) order at the same price level
    pub(crate) next: Option<OrderHandle>,

    /// Previous (older) order, enables O(1) removal
    pub(crate) prev: Option<OrderHandle>,
}

impl OrderRecord {
    /// Create a new, unlinked record
    #[inline]
    pub fn new(key: OrderKey, instrument_id: u64, side: Side, price: u64, quantity: u64) -> Self {
        Self {
            key,
            price,
            quantity,
            instrument_id,
            side,
            next: None,
            prev: None,
        }
    }

    /// Tombstone contents for a free slot
    #[inline]
    const fn empty() -> Self {
        Self {
            key: OrderKey::new(0, 0),
            price: 0,
            quantity: 0,
            instrument_id: 0,
            side: Side::Buy,
            next: None,
            prev: None,
        }
    }

    /// Remaining quantity
    #[inline]
    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }

    /// Reduce remaining quantity by `qty`.
    ///
    /// # Panics
    /// Panics if `qty` exceeds the remaining quantity.
    #[inline]
    pub fn fill(&mut self, qty: u64) {
        self.quantity = self.quantity.checked_sub(qty).unwrap_or_else(|| {
            panic!(
                "quantity underflow on order {}: remaining {}, fill {}",
                self.key, self.quantity, qty
            )
        });
    }
}

impl fmt::Debug for OrderRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderRecord")
            .field("key", &self.key)
            .field("instrument_id", &self.instrument_id)
            .field("side", &self.side)
            .field("price", &self.price)
            .field("quantity", &self.quantity)
            .finish()
    }
}

struct Slot {
    record: OrderRecord,
    generation: u32,
    membership: Membership,
    /// Free list link, only meaningful while `membership == Free`
    next_free: u32,
}

impl Slot {
    const fn vacant(next_free: u32) -> Self {
        Self {
            record: OrderRecord::empty(),
            generation: 0,
            membership: Membership::Free,
            next_free,
        }
    }
}

/// Pool of order records with O(1) allocation and deallocation.
///
/// Fixed capacity by default. A growable arena appends fresh slots when
/// the free list runs dry instead of failing.
pub struct Arena {
    slots: Vec<Slot>,

    /// Head of the free list (index of first available slot)
    free_head: u32,

    /// Number of currently allocated records
    allocated_count: u32,

    /// Slot limit for a fixed arena; initial size for a growable one
    capacity: u32,

    growable: bool,

    /// Slots taken out of service once their generation ran out
    retired: u32,

    total_allocs: u64,
    total_frees: u64,
}

impl Arena {
    /// Create a fixed arena holding at most `capacity` records.
    ///
    /// # Panics
    /// Panics if capacity is not below `NULL_INDEX`.
    pub fn new(capacity: u32) -> Self {
        Self::build(capacity, false)
    }

    /// Create an arena that starts with `initial` slots and grows on demand.
    pub fn growable(initial: u32) -> Self {
        Self::build(initial, true)
    }

    fn build(capacity: u32, growable: bool) -> Self {
        assert!(capacity < NULL_INDEX, "Capacity must be less than NULL_INDEX");

        // Thread the free list through all slots
        let slots = (0..capacity)
            .map(|i| Slot::vacant(if i + 1 < capacity { i + 1 } else { NULL_INDEX }))
            .collect();

        Self {
            slots,
            free_head: if capacity > 0 { 0 } else { NULL_INDEX },
            allocated_count: 0,
            capacity,
            growable,
            retired: 0,
            total_allocs: 0,
            total_frees: 0,
        }
    }

    /// Allocate a slot and initialise it with `record`.
    ///
    /// The record starts out `Pending`.
    ///
    /// # Complexity
    /// O(1) amortised - pops from head of free list
    #[inline]
    pub fn alloc(&mut self, record: OrderRecord) -> Result<OrderHandle, ArenaError> {
        if self.free_head == NULL_INDEX && !self.grow() {
            return Err(ArenaError::Exhausted {
                capacity: self.capacity(),
            });
        }

        let index = self.free_head;
        let slot = &mut self.slots[index as usize];
        debug_assert_eq!(slot.membership, Membership::Free);
        self.free_head = slot.next_free;

        slot.record = OrderRecord {
            next: None,
            prev: None,
            ..record
        };
        slot.membership = Membership::Pending;
        slot.next_free = NULL_INDEX;

        self.allocated_count += 1;
        self.total_allocs += 1;

        Ok(OrderHandle {
            index,
            generation: slot.generation,
        })
    }

    fn grow(&mut self) -> bool {
        if !self.growable || self.slots.len() >= (NULL_INDEX - 1) as usize {
            return false;
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::vacant(NULL_INDEX));
        self.free_head = index;
        true
    }

    /// Return a record's slot to the arena, yielding its final contents.
    ///
    /// # Panics
    /// Panics on a stale handle (double free) or if the record is still
    /// resting in a book.
    ///
    /// # Complexity
    /// O(1) - pushes to head of free list
    #[inline]
    pub fn free(&mut self, handle: OrderHandle) -> OrderRecord {
        let free_head = self.free_head;
        let slot = self.live_slot_mut(handle);
        if let Membership::Resting(side) = slot.membership {
            panic!(
                "freeing order {} while it rests on the {:?} side",
                slot.record.key, side
            );
        }

        let record = slot.record;
        slot.record = OrderRecord::empty();
        slot.generation += 1;
        slot.membership = Membership::Free;

        if slot.generation == u32::MAX {
            slot.next_free = NULL_INDEX;
            self.retired += 1;
        } else {
            slot.next_free = free_head;
            self.free_head = handle.index;
        }
        self.allocated_count -= 1;
        self.total_frees += 1;

        record
    }

    /// Get an immutable reference to a live record.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn get(&self, handle: OrderHandle) -> &OrderRecord {
        match self.try_get(handle) {
            Some(record) => record,
            None => panic!("stale order handle {:?}", handle),
        }
    }

    /// Get a mutable reference to a live record.
    ///
    /// # Panics
    /// Panics if the handle is stale.
    #[inline]
    pub fn get_mut(&mut self, handle: OrderHandle) -> &mut OrderRecord {
        &mut self.live_slot_mut(handle).record
    }

    /// Checked lookup: `None` if the handle no longer names a live record.
    #[inline]
    pub fn try_get(&self, handle: OrderHandle) -> Option<&OrderRecord> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation && slot.membership != Membership::Free)
            .map(|slot| &slot.record)
    }

    /// Membership state of the slot a handle names.
    ///
    /// A stale handle reports `Free`.
    #[inline]
    pub fn membership(&self, handle: OrderHandle) -> Membership {
        match self.slots.get(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation => slot.membership,
            _ => Membership::Free,
        }
    }

    #[inline]
    pub(crate) fn set_membership(&mut self, handle: OrderHandle, membership: Membership) {
        debug_assert_ne!(membership, Membership::Free);
        self.live_slot_mut(handle).membership = membership;
    }

    #[inline]
    fn live_slot_mut(&mut self, handle: OrderHandle) -> &mut Slot {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.membership != Membership::Free => slot,
            _ => panic!("stale order handle {:?}", handle),
        }
    }

    /// Returns the number of currently allocated records.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    /// Returns the current number of slots.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity.max(self.slots.len() as u32)
    }

    #[inline]
    pub fn is_growable(&self) -> bool {
        self.growable
    }

    /// Returns true if no record is allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.allocated_count == 0
    }

    /// Returns true if the next allocation would fail.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free_head == NULL_INDEX && !self.growable
    }

    /// Slots permanently retired after exhausting their generations
    #[inline]
    pub fn retired(&self) -> u32 {
        self.retired
    }

    /// Allocations since creation
    #[inline]
    pub fn total_allocations(&self) -> u64 {
        self.total_allocs
    }

    /// Frees since creation
    #[inline]
    pub fn total_frees(&self) -> u64 {
        self.total_frees
    }

    /// Pre-fault all memory pages (warm-up routine).
    ///
    /// Walks through every slot so the OS maps the pages before the
    /// first order arrives.
    pub fn warm_up(&mut self) {
        for slot in &mut self.slots {
            std::hint::black_box(&mut slot.next_free);
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("capacity", &self.capacity())
            .field("growable", &self.growable)
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .field("retired", &self.retired)
            .finish()
    }
}
