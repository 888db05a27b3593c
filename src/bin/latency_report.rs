//! Hot-path latency histogram: time each instruction through the
//! synchronous engine entry point and print percentiles.

use std::time::{Duration, Instant};

use anyhow::Result;
use hdrhistogram::Histogram;
use slab_matcher::{DiscardSink, Engine, EngineConfig, Instruction};

const ITERATIONS: u32 = 1_000_000;
const INSTRUMENTS: u64 = 4;
const TRADERS: u32 = 64;

fn main() -> Result<()> {
    println!("Preparing latency benchmark...");

    let config = EngineConfig {
        arena_capacity: 100_000,
        growable_arena: true,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(&config);
    engine.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 1_000_000, 3)?;
    let mut sink = DiscardSink::default();

    println!("Running {} iterations...", ITERATIONS);

    let mut total_duration = Duration::ZERO;

    for trade_id in 1..=ITERATIONS {
        let instruction = next_instruction(trade_id);

        // Critical measurement section
        let start = Instant::now();
        engine.process_into(std::hint::black_box(instruction), &mut sink);
        let elapsed = start.elapsed();

        // Outliers past the upper bound are clamped
        histogram.saturating_record(elapsed.as_nanos() as u64);
        total_duration += elapsed;
    }

    let stats = engine.stats();

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!("Throughput: {:.2} ops/sec", f64::from(ITERATIONS) / total_duration.as_secs_f64());
    println!("Fills:      {}", stats.fills);
    println!("Cancels:    {}", stats.cancels);
    println!("Resting:    {}", engine.order_count());
    println!("Notified:   {}", sink.count);
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100, 2.0) {
        let count = v.count_since_last_iteration();
        if count > 0 {
            println!("<= {:8} ns: {:10}", v.value_iterated_to(), count);
        }
    }

    Ok(())
}

/// Fixed interleaving: every tenth instruction cancels an earlier trade
/// id, the rest alternate sides over a 100-tick band so about half cross.
fn next_instruction(trade_id: u32) -> Instruction {
    let trader = trade_id % TRADERS + 1;
    let instrument = u64::from(trade_id) % INSTRUMENTS;

    if trade_id % 10 == 0 {
        let target = trade_id.saturating_sub(37 * (trade_id % 7 + 1)).max(1);
        return Instruction::cancel(target % TRADERS + 1, target, u64::from(target) % INSTRUMENTS);
    }

    let price = 9_950 + u64::from(trade_id.wrapping_mul(7_919) % 100);
    let quantity = u64::from(trade_id % 499) + 1;
    if trade_id % 2 == 0 {
        Instruction::buy(trader, trade_id, instrument, price, quantity)
    } else {
        Instruction::sell(trader, trade_id, instrument, price, quantity)
    }
}
