//! Engine - Single-consumer runtime with CPU pinning and warm-up.
//!
//! Wraps the matching engine with a bounded instruction queue. Any number
//! of producers hold an [`EngineHandle`]; one dedicated thread drains the
//! queue in arrival order and runs each instruction to completion.

use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::command::{Instruction, Notification};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::matching::{MatchStats, MatchingEngine};
use crate::notify::NotificationSink;

/// The engine: owns every arena record and every book.
pub struct Engine {
    /// The underlying matching engine
    pub matcher: MatchingEngine,
}

impl Engine {
    /// Create a new engine sized from `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            matcher: MatchingEngine::with_arena(config.build_arena()),
        }
    }

    /// Spawn the engine on its own thread.
    ///
    /// The thread pins itself if configured, warms up, then drains the
    /// queue until every [`EngineHandle`] has been dropped. Joining the
    /// returned handle gives back the engine for inspection.
    pub fn spawn<S>(
        config: EngineConfig,
        mut sink: S,
    ) -> std::io::Result<(EngineHandle, JoinHandle<Engine>)>
    where
        S: NotificationSink + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));

        let join = thread::Builder::new()
            .name("matcher-engine".to_string())
            .spawn(move || {
                let mut engine = Engine::new(&config);
                if config.pin_to_core {
                    engine.pin_to_core();
                }
                engine.warm_up();
                engine.run(rx, &mut sink);
                engine
            })?;

        Ok((EngineHandle { tx }, join))
    }

    /// Run the engine event loop.
    ///
    /// Blocks the calling thread; must not be called from inside an async
    /// runtime. Returns once the queue is closed and drained.
    pub fn run<S: NotificationSink + ?Sized>(
        &mut self,
        mut input: mpsc::Receiver<Instruction>,
        sink: &mut S,
    ) {
        info!(
            capacity = self.matcher.arena.capacity(),
            growable = self.matcher.arena.is_growable(),
            "engine started"
        );

        while let Some(instruction) = input.blocking_recv() {
            self.process_into(instruction, sink);
        }

        let stats = self.stats();
        info!(
            fills = stats.fills,
            volume = stats.filled_volume,
            cancels = stats.cancels,
            rejections = stats.rejections,
            resting = self.order_count(),
            "engine stopped"
        );
    }

    /// Process a single instruction and return its notifications.
    ///
    /// This is the main entry point for synchronous usage (testing, benchmarks).
    #[inline]
    pub fn process_instruction(&mut self, instruction: Instruction) -> Vec<Notification> {
        let mut notifications = Vec::new();
        self.matcher.process(instruction, &mut notifications);
        notifications
    }

    /// Process a single instruction, reporting into `sink`.
    #[inline]
    pub fn process_into<S: NotificationSink + ?Sized>(&mut self, instruction: Instruction, sink: &mut S) {
        self.matcher.process(instruction, sink);
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically isolated from OS interrupts.
    pub fn pin_to_core(&self) {
        let Some(last_core) = core_affinity::get_core_ids().and_then(|ids| ids.last().copied()) else {
            warn!("no core ids available, engine thread left unpinned");
            return;
        };
        if core_affinity::set_for_current(last_core) {
            debug!(core = last_core.id, "engine thread pinned");
        } else {
            warn!(core = last_core.id, "failed to pin engine thread");
        }
    }

    /// Warm up the engine by pre-faulting memory pages.
    pub fn warm_up(&mut self) {
        self.matcher.warm_up();
    }

    #[inline]
    pub fn best_bid(&self, instrument_id: u64) -> Option<u64> {
        self.matcher.best_bid(instrument_id)
    }

    #[inline]
    pub fn best_ask(&self, instrument_id: u64) -> Option<u64> {
        self.matcher.best_ask(instrument_id)
    }

    #[inline]
    pub fn spread(&self, instrument_id: u64) -> Option<u64> {
        self.matcher.book(instrument_id).and_then(|book| book.spread())
    }

    /// Get total resting order count.
    #[inline]
    pub fn order_count(&self) -> usize {
        self.matcher.order_count()
    }

    #[inline]
    pub fn stats(&self) -> MatchStats {
        self.matcher.stats()
    }

    /// Compute state hash for determinism testing.
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// Producer side of the engine queue. Cheap to clone.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<Instruction>,
}

impl EngineHandle {
    /// Enqueue, waiting for room if the queue is full.
    pub async fn submit(&self, instruction: Instruction) -> Result<(), EngineError> {
        self.tx
            .send(instruction)
            .await
            .map_err(|_| EngineError::QueueClosed)
    }

    /// Enqueue from synchronous code, blocking while the queue is full.
    pub fn blocking_submit(&self, instruction: Instruction) -> Result<(), EngineError> {
        self.tx
            .blocking_send(instruction)
            .map_err(|_| EngineError::QueueClosed)
    }

    /// Enqueue without waiting.
    pub fn try_submit(&self, instruction: Instruction) -> Result<(), EngineError> {
        self.tx.try_send(instruction).map_err(|err| match err {
            TrySendError::Full(_) => EngineError::QueueFull,
            TrySendError::Closed(_) => EngineError::QueueClosed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
