//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Accepts TCP connections on a caller-supplied listener.
//! - Assigns each connection the next trader id, starting at 1.
//! - Spawns a session task per connection for framed I/O.
//! - Spawns the engine thread, whose notification sink is the session
//!   registry, and joins it again on shutdown.

mod session;

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use crate::command::Notification;
use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::notify::NotificationSink;

/// Outbound notifications for one session, bounded by
/// `ServerConfig::outbound_depth`.
pub type OutboundTx = mpsc::Sender<Notification>;
pub type OutboundRx = mpsc::Receiver<Notification>;

/// Connected sessions by trader id.
pub type SessionRegistry = Arc<RwLock<FxHashMap<u32, OutboundTx>>>;

/// Routes each notification to the session of the trader it names.
///
/// Runs on the engine thread and never waits: a trader with no session, a
/// session that is closing, or one whose outbound queue is full simply
/// misses the notification.
pub struct SessionSink {
    sessions: SessionRegistry,
}

impl SessionSink {
    pub fn new(sessions: SessionRegistry) -> Self {
        Self { sessions }
    }
}

impl NotificationSink for SessionSink {
    fn notify(&mut self, notification: Notification) {
        let sessions = self.sessions.blocking_read();
        let Some(tx) = sessions.get(&notification.trader_id) else {
            trace!(trader = notification.trader_id, "no session, notification dropped");
            return;
        };
        match tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(trader = notification.trader_id, "outbound queue full, notification dropped");
            }
            Err(TrySendError::Closed(_)) => {
                trace!(trader = notification.trader_id, "session closing, notification dropped");
            }
        }
    }
}

/// Serve until the listener fails.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> std::io::Result<()> {
    serve_with_shutdown(listener, config, std::future::pending()).await
}

/// Serve until `shutdown` resolves or the listener fails.
///
/// Either way every session is closed and the engine thread is joined
/// before this returns.
pub async fn serve_with_shutdown(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    let sessions: SessionRegistry = Arc::new(RwLock::new(FxHashMap::default()));
    let (engine, engine_thread) = Engine::spawn(config.engine.clone(), SessionSink::new(sessions.clone()))?;
    let next_trader_id = AtomicU32::new(1);
    let mut tasks = JoinSet::new();

    info!(addr = ?listener.local_addr().ok(), max_sessions = config.max_sessions, "listening");

    tokio::pin!(shutdown);
    let result = loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => break Err(err),
            },
            Some(_) = tasks.join_next(), if !tasks.is_empty() => continue,
            _ = &mut shutdown => {
                info!("shutdown requested");
                break Ok(());
            }
        };

        let connected = sessions.read().await.len();
        if connected >= config.max_sessions {
            warn!(%peer_addr, max_sessions = config.max_sessions, "refusing connection");
            continue;
        }

        if let Err(err) = stream.set_nodelay(true) {
            debug!(%peer_addr, error = %err, "set_nodelay failed");
        }

        let trader_id = next_trader_id.fetch_add(1, Ordering::Relaxed);
        let (out_tx, out_rx) = mpsc::channel(config.outbound_depth.max(1));
        sessions.write().await.insert(trader_id, out_tx.clone());
        info!(trader = trader_id, %peer_addr, "session opened");

        let sessions = sessions.clone();
        let engine = engine.clone();
        tasks.spawn(async move {
            if let Err(err) =
                session::run_session(trader_id, stream, engine, out_tx, out_rx, sessions).await
            {
                error!(trader = trader_id, error = %err, "session failed");
            } else {
                info!(trader = trader_id, "session closed");
            }
        });
    };

    // Dropping every session and our handle closes the engine queue
    tasks.shutdown().await;
    drop(engine);
    sessions.write().await.clear();

    match tokio::task::spawn_blocking(move || engine_thread.join()).await {
        Ok(Ok(engine)) => info!(resting = engine.order_count(), "engine joined"),
        Ok(Err(_)) => error!("engine thread panicked"),
        Err(err) => error!(error = %err, "failed to join engine thread"),
    }

    result
}
