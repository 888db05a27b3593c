//! Feed a CSV instruction file through the engine and write every
//! notification as CSV.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use slab_matcher::replay::{InstructionRow, NotificationRow};
use slab_matcher::{Engine, EngineConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a CSV instruction file through the matching engine")]
struct Args {
    /// Instruction file (kind,trader_id,trade_id,instrument_id,price,quantity)
    input: PathBuf,

    /// Write notifications here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Order records the arena can hold
    #[arg(long, default_value_t = 1_000_000)]
    arena_capacity: u32,

    /// Print a book summary per instrument at the end
    #[arg(long)]
    summary: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let sink: Box<dyn io::Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut engine = Engine::new(&EngineConfig::with_capacity(args.arena_capacity));
    let mut replayed = 0u64;
    let mut skipped = 0u64;

    for (line, row) in reader.deserialize::<InstructionRow>().enumerate() {
        // Header is line 1
        let row = row.with_context(|| format!("parsing line {}", line + 2))?;
        let Some(instruction) = row.to_instruction() else {
            warn!(line = line + 2, kind = %row.kind, "unsupported instruction kind, skipped");
            skipped += 1;
            continue;
        };

        for notification in engine.process_instruction(instruction) {
            writer.serialize(NotificationRow::from(&notification))?;
        }
        replayed += 1;
    }
    writer.flush()?;

    let stats = engine.stats();
    info!(
        replayed,
        skipped,
        fills = stats.fills,
        volume = stats.filled_volume,
        cancels = stats.cancels,
        rejections = stats.rejections,
        resting = engine.order_count(),
        "replay finished"
    );

    if args.summary {
        for book in engine.matcher.books.iter() {
            info!(
                instrument = book.instrument_id(),
                best_bid = ?book.best_bid(),
                best_ask = ?book.best_ask(),
                bid_levels = book.bids.level_count(),
                ask_levels = book.asks.level_count(),
                orders = book.order_count(),
                "book"
            );
        }
    }

    Ok(())
}
