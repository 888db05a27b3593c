//! Stress Tests - Push the engine to its limits.
//!
//! These tests verify correctness under extreme conditions:
//! - Near-capacity operation
//! - High contention at single price levels
//! - Rapid order churn
//! - Maximum values for prices and quantities

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use slab_matcher::{
    Engine, EngineConfig, Instruction, Notification, NotificationKind, OrderKey, RejectReason,
};

const INSTR: u64 = 1;

fn engine(capacity: u32) -> Engine {
    Engine::new(&EngineConfig::with_capacity(capacity))
}

fn fills(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| matches!(n.kind, NotificationKind::Partial | NotificationKind::Full))
        .count()
        / 2
}

fn is_resting(engine: &Engine, trader: u32, trade: u32) -> bool {
    engine
        .matcher
        .resting_order(INSTR, OrderKey::new(trader, trade))
        .is_some()
}

// ============================================================================
// Capacity Stress Tests
// ============================================================================

#[test]
fn test_near_capacity_operation() {
    const CAPACITY: u32 = 10_000;
    let mut engine = engine(CAPACITY);

    // Fill to 95% capacity
    let target_orders = CAPACITY / 20 * 19;

    for i in 0..target_orders {
        // Use non-overlapping prices: bids 8000-8990, asks 10000-10990
        let price_step = u64::from(i % 100) * 10;
        let instr = if i % 2 == 0 {
            Instruction::buy(1, i, INSTR, 8000 + price_step, 100)
        } else {
            Instruction::sell(1, i, INSTR, 10000 + price_step, 100)
        };
        let out = engine.process_instruction(instr);

        // Verify the order rested (not rejected due to arena full)
        assert!(out.is_empty(), "Order {} should rest, got {:?}", i, out);
    }

    assert_eq!(engine.order_count(), target_orders as usize);
    assert_eq!(engine.matcher.arena.allocated(), target_orders);
}

#[test]
fn test_arena_full_rejection() {
    const CAPACITY: u32 = 100;
    let mut engine = engine(CAPACITY);

    // Fill arena completely
    for i in 0..CAPACITY {
        engine.process_instruction(Instruction::buy(1, i, INSTR, 9000 + u64::from(i) * 10, 100));
    }
    assert!(engine.matcher.arena.is_full());

    // Next order should be rejected
    let out = engine.process_instruction(Instruction::buy(1, CAPACITY, INSTR, 10000, 100));

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, NotificationKind::Rejected(RejectReason::ArenaExhausted));
    assert_eq!(out[0].trade_id, CAPACITY);
    assert_eq!(engine.order_count(), CAPACITY as usize);
    assert_eq!(engine.stats().rejections, 1);
}

#[test]
fn test_full_arena_still_cancels() {
    let mut engine = engine(10);
    for i in 0..10 {
        engine.process_instruction(Instruction::sell(1, i, INSTR, 10000, 5));
    }

    let out = engine.process_instruction(Instruction::cancel(1, 3, INSTR));
    assert_eq!(out[0].kind, NotificationKind::Cancelled);
    assert_eq!(engine.order_count(), 9);
}

#[test]
fn test_arena_reuse_after_cancel() {
    const CAPACITY: u32 = 100;
    let mut engine = engine(CAPACITY);

    // Fill arena
    for i in 0..CAPACITY {
        engine.process_instruction(Instruction::buy(1, i, INSTR, 9000, 100));
    }

    // Cancel one order
    engine.process_instruction(Instruction::cancel(1, 50, INSTR));

    // Now we can add one more
    let out = engine.process_instruction(Instruction::buy(1, 1000, INSTR, 9000, 100));

    assert!(out.is_empty(), "Should be able to add order after cancel frees slot");
    assert!(is_resting(&engine, 1, 1000));
}

#[test]
fn test_growable_arena_never_rejects() {
    let config = EngineConfig {
        growable_arena: true,
        ..EngineConfig::with_capacity(16)
    };
    let mut engine = Engine::new(&config);

    for i in 0..1_000 {
        let out = engine.process_instruction(Instruction::buy(1, i, INSTR, 9000 + u64::from(i), 1));
        assert!(out.is_empty());
    }

    assert_eq!(engine.order_count(), 1_000);
    assert!(engine.matcher.arena.capacity() >= 1_000);
}

// ============================================================================
// High Contention Tests
// ============================================================================

#[test]
fn test_single_price_level_contention() {
    let mut engine = engine(10_000);
    const ORDERS_PER_SIDE: u32 = 1000;

    // Add many orders at the same price
    for i in 0..ORDERS_PER_SIDE {
        engine.process_instruction(Instruction::sell(i % 100 + 1, i, INSTR, 10000, 100));
    }

    // Verify all are tracked
    assert_eq!(engine.order_count(), ORDERS_PER_SIDE as usize);
    assert_eq!(
        engine.matcher.book(INSTR).unwrap().asks.depth_at(10000),
        (u128::from(ORDERS_PER_SIDE) * 100, ORDERS_PER_SIDE)
    );

    // Match through all of them
    let out = engine.process_instruction(Instruction::buy(
        999,
        0,
        INSTR,
        10000,
        u64::from(ORDERS_PER_SIDE) * 100,
    ));

    assert_eq!(fills(&out), ORDERS_PER_SIDE as usize, "Should have {} fills", ORDERS_PER_SIDE);
    assert_eq!(out.last().unwrap().kind, NotificationKind::Full);
    assert_eq!(engine.order_count(), 0, "Book should be empty after matching all");
    assert!(engine.matcher.arena.is_empty());
}

#[test]
fn test_fifo_priority_under_contention() {
    let mut engine = engine(1000);

    // Add 100 orders at same price, one trader each
    for i in 0..100u32 {
        engine.process_instruction(Instruction::sell(i + 1, i, INSTR, 10000, 10));
    }

    // Match 50 orders worth
    let out = engine.process_instruction(Instruction::buy(999, 0, INSTR, 10000, 500));

    // Verify FIFO order through the sellers' notifications
    let makers: Vec<_> = out.iter().filter(|n| n.trader_id != 999).map(|n| n.trade_id).collect();

    assert_eq!(makers.len(), 50);
    for (i, &maker_trade) in makers.iter().enumerate() {
        assert_eq!(maker_trade, i as u32, "Fill {} should hit order {}", i, i);
    }
    assert!(is_resting(&engine, 51, 50));
}

// ============================================================================
// Rapid Churn Tests
// ============================================================================

#[test]
fn test_rapid_add_cancel_cycles() {
    let mut engine = engine(1000);
    const CYCLES: u32 = 10_000;

    for cycle in 0..CYCLES {
        let instr = if cycle % 2 == 0 {
            Instruction::buy(1, cycle, INSTR, 10000, 100)
        } else {
            Instruction::sell(1, cycle, INSTR, 10000, 100)
        };

        // Add
        assert!(engine.process_instruction(instr).is_empty());

        // Cancel
        let out = engine.process_instruction(Instruction::cancel(1, cycle, INSTR));
        assert_eq!(out[0].kind, NotificationKind::Cancelled);
        assert_eq!(out[0].quantity, 100);
    }

    assert_eq!(engine.order_count(), 0, "All orders should be cancelled");
    assert_eq!(engine.matcher.arena.total_allocations(), u64::from(CYCLES));
    assert_eq!(engine.matcher.arena.total_frees(), u64::from(CYCLES));
}

#[test]
fn test_rapid_match_cycles() {
    let mut engine = engine(10_000);
    const CYCLES: u32 = 5_000;

    let mut total_fills = 0;

    for cycle in 0..CYCLES {
        // Place ask
        engine.process_instruction(Instruction::sell(1, cycle, INSTR, 10000, 100));

        // Place matching bid
        let out = engine.process_instruction(Instruction::buy(2, cycle, INSTR, 10000, 100));
        total_fills += fills(&out);
    }

    assert_eq!(total_fills, CYCLES as usize, "Should have {} fills", CYCLES);
    assert_eq!(engine.order_count(), 0, "Book should be empty");
    assert!(engine.matcher.arena.is_empty());
}

// ============================================================================
// Edge Case Tests
// ============================================================================

#[test]
fn test_zero_price() {
    let mut engine = engine(1000);

    // Price of 0 is accepted
    let out = engine.process_instruction(Instruction::buy(1, 1, INSTR, 0, 100));

    assert!(out.is_empty());
    assert_eq!(engine.best_bid(INSTR), Some(0));
}

#[test]
fn test_max_price() {
    let mut engine = engine(1000);

    engine.process_instruction(Instruction::sell(1, 1, INSTR, u64::MAX - 1, 100));
    assert_eq!(engine.best_ask(INSTR), Some(u64::MAX - 1));

    // Midpoint of the two extremes must not overflow
    let out = engine.process_instruction(Instruction::buy(2, 1, INSTR, u64::MAX, 100));
    assert_eq!(out[0].price, u64::MAX - 1);
    assert_eq!(engine.order_count(), 0);
}

#[test]
fn test_max_quantity() {
    let mut engine = engine(1000);

    let out = engine.process_instruction(Instruction::buy(1, 1, INSTR, 10000, u64::MAX));
    assert!(out.is_empty());

    let out = engine.process_instruction(Instruction::sell(2, 1, INSTR, 10000, u64::MAX - 1));
    assert_eq!(out[0].kind, NotificationKind::Partial);
    assert_eq!(out[1].kind, NotificationKind::Full);
    assert_eq!(engine.matcher.book(INSTR).unwrap().bids.depth_at(10000), (1, 1));
}

#[test]
fn test_max_quantities_share_a_level() {
    let mut engine = engine(1000);

    assert!(engine.process_instruction(Instruction::buy(1, 1, INSTR, 10000, u64::MAX)).is_empty());
    assert!(engine.process_instruction(Instruction::buy(1, 2, INSTR, 10000, 2)).is_empty());
    assert_eq!(
        engine.matcher.book(INSTR).unwrap().bids.depth_at(10000),
        (u128::from(u64::MAX) + 2, 2)
    );

    let out = engine.process_instruction(Instruction::sell(2, 1, INSTR, 10000, u64::MAX));
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|n| n.kind == NotificationKind::Full && n.quantity == u64::MAX));
    assert_eq!(engine.stats().filled_volume, u128::from(u64::MAX));

    // Volume keeps counting past u64::MAX
    let out = engine.process_instruction(Instruction::sell(2, 2, INSTR, 10000, 5));
    assert_eq!(out[0].kind, NotificationKind::Full);
    assert_eq!(out[1].kind, NotificationKind::Partial);
    assert_eq!(out[1].quantity, 2);
    assert_eq!(engine.stats().filled_volume, u128::from(u64::MAX) + 2);

    let book = engine.matcher.book(INSTR).unwrap();
    assert_eq!(book.bids.depth_at(10000), (0, 0));
    assert_eq!(book.asks.depth_at(10000), (3, 1));
    assert!(engine.matcher.is_consistent());
}

#[test]
fn test_quantity_one() {
    let mut engine = engine(1000);

    assert!(engine.process_instruction(Instruction::buy(1, 1, INSTR, 10000, 1)).is_empty());
    let out = engine.process_instruction(Instruction::sell(2, 1, INSTR, 10000, 1));
    assert_eq!(fills(&out), 1);
}

#[test]
fn test_many_price_levels() {
    let mut engine = engine(100_000);
    const LEVELS: u32 = 10_000;

    // Create many sparse price levels
    for i in 0..LEVELS {
        engine.process_instruction(Instruction::buy(1, i, INSTR, u64::from(i) * 1000, 100));
    }

    assert_eq!(engine.order_count(), LEVELS as usize);
    assert_eq!(engine.best_bid(INSTR), Some(u64::from(LEVELS - 1) * 1000));
    assert_eq!(engine.matcher.book(INSTR).unwrap().bids.level_count(), LEVELS as usize);
}

#[test]
fn test_many_instruments() {
    let mut engine = engine(10_000);

    for instrument in 0..1_000u64 {
        engine.process_instruction(Instruction::buy(1, 1, instrument, 100, 10));
        engine.process_instruction(Instruction::sell(2, 1, instrument, 101, 10));
    }

    assert_eq!(engine.matcher.books.len(), 1_000);
    assert_eq!(engine.order_count(), 2_000);
    assert_eq!(engine.spread(777), Some(1));
}

// ============================================================================
// Cancel Edge Cases
// ============================================================================

#[test]
fn test_double_cancel() {
    let mut engine = engine(1000);

    engine.process_instruction(Instruction::buy(1, 1, INSTR, 10000, 100));

    // First cancel
    let out = engine.process_instruction(Instruction::cancel(1, 1, INSTR));
    assert_eq!(out[0].kind, NotificationKind::Cancelled);

    // Second cancel finds nothing
    let out = engine.process_instruction(Instruction::cancel(1, 1, INSTR));
    assert_eq!(out[0].kind, NotificationKind::NotCancelled);
    assert_eq!((out[0].price, out[0].quantity), (0, 0));
}

#[test]
fn test_cancel_other_traders_identity_misses() {
    let mut engine = engine(1000);

    engine.process_instruction(Instruction::buy(1, 1, INSTR, 10000, 100));

    let out = engine.process_instruction(Instruction::cancel(2, 1, INSTR));
    assert_eq!(out[0].kind, NotificationKind::NotCancelled);
    assert_eq!(out[0].trader_id, 2);
    assert!(is_resting(&engine, 1, 1));
}

#[test]
fn test_cancel_during_partial_fill() {
    let mut engine = engine(1000);

    // Place large resting order
    engine.process_instruction(Instruction::sell(1, 1, INSTR, 10000, 1000));

    // Partially fill it
    let out = engine.process_instruction(Instruction::buy(2, 1, INSTR, 10000, 300));
    assert_eq!(out[1].kind, NotificationKind::Partial);

    // Cancel remaining
    let out = engine.process_instruction(Instruction::cancel(1, 1, INSTR));
    assert_eq!(out[0].kind, NotificationKind::Cancelled);
    assert_eq!(out[0].quantity, 700);
    assert_eq!(engine.order_count(), 0);
}

// ============================================================================
// Matching Edge Cases
// ============================================================================

#[test]
fn test_self_trade_allowed() {
    let mut engine = engine(1000);

    engine.process_instruction(Instruction::sell(1, 1, INSTR, 10000, 100));
    let out = engine.process_instruction(Instruction::buy(1, 2, INSTR, 10000, 100));

    assert_eq!(fills(&out), 1);
    assert!(out.iter().all(|n| n.trader_id == 1));
}

#[test]
fn test_partial_match_across_levels() {
    let mut engine = engine(1000);

    engine.process_instruction(Instruction::sell(1, 1, INSTR, 10000, 100));
    engine.process_instruction(Instruction::sell(1, 2, INSTR, 10010, 100));
    engine.process_instruction(Instruction::sell(1, 3, INSTR, 10020, 100));

    // Sweeps two levels and rests the remainder below the third
    let out = engine.process_instruction(Instruction::buy(2, 1, INSTR, 10015, 250));

    assert_eq!(fills(&out), 2);
    assert_eq!(engine.best_bid(INSTR), Some(10015));
    assert_eq!(engine.best_ask(INSTR), Some(10020));
    assert_eq!(
        engine.matcher.resting_order(INSTR, OrderKey::new(2, 1)).unwrap().quantity(),
        50
    );
}

// ============================================================================
// Large Scale Fuzzing
// ============================================================================

#[test]
fn test_large_random_workload() {
    const SEED: u64 = 0xABCDEF123456;
    const OPS: usize = 50_000;

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    let mut engine = engine(100_000);

    let mut next_trade_id = 1u32;
    let mut resting: Vec<(u32, u32)> = Vec::new();
    let mut total_fills = 0usize;
    let mut total_cancels = 0u64;

    for _ in 0..OPS {
        let op = rng.gen_range(0..100);

        if op < 70 || resting.is_empty() {
            // 70% place
            let trader = rng.gen_range(1..1000);
            let price = rng.gen_range(9000..11000) * 100;
            let qty = rng.gen_range(1..500);
            let instr = if rng.gen_bool(0.5) {
                Instruction::buy(trader, next_trade_id, INSTR, price, qty)
            } else {
                Instruction::sell(trader, next_trade_id, INSTR, price, qty)
            };

            total_fills += fills(&engine.process_instruction(instr));
            if is_resting(&engine, trader, next_trade_id) {
                resting.push((trader, next_trade_id));
            }
            next_trade_id += 1;
        } else {
            // 30% cancel
            let idx = rng.gen_range(0..resting.len());
            let (trader, trade) = resting.swap_remove(idx);

            let out = engine.process_instruction(Instruction::cancel(trader, trade, INSTR));
            if out[0].kind == NotificationKind::Cancelled {
                total_cancels += 1;
            }
        }
    }

    let stats = engine.stats();
    assert_eq!(stats.fills as usize, total_fills);
    assert_eq!(stats.cancels, total_cancels);
    assert!(engine.matcher.is_consistent());

    println!("Large workload test completed:");
    println!("  Operations: {}", OPS);
    println!("  Orders placed: {}", next_trade_id - 1);
    println!("  Total fills: {}", total_fills);
    println!("  Total cancels: {}", total_cancels);
    println!("  Final book size: {}", engine.order_count());
}

// ============================================================================
// Memory Leak Detection
// ============================================================================

#[test]
fn test_arena_returns_all_slots() {
    const CAPACITY: u32 = 1000;
    let mut engine = engine(CAPACITY);

    // Add all orders with non-overlapping prices: bids 5000-5499, asks 15000-15499
    for i in 0..CAPACITY {
        let offset = u64::from(i / 2 % 500);
        let instr = if i % 2 == 0 {
            Instruction::buy(1, i, INSTR, 5000 + offset, 100)
        } else {
            Instruction::sell(1, i, INSTR, 15000 + offset, 100)
        };
        engine.process_instruction(instr);
    }

    assert_eq!(engine.order_count(), CAPACITY as usize);
    assert!(engine.matcher.arena.is_full());

    // Cancel all orders
    for i in 0..CAPACITY {
        engine.process_instruction(Instruction::cancel(1, i, INSTR));
    }

    assert_eq!(engine.order_count(), 0);
    assert!(engine.matcher.arena.is_empty());

    // Should be able to fill again (arena slots reused)
    for i in 0..CAPACITY {
        let out = engine.process_instruction(Instruction::buy(1, i + CAPACITY, INSTR, 10000, 100));
        assert!(out.is_empty(), "Order {} should rest after arena reset", i);
    }
    assert!(engine.matcher.arena.is_full());
}
