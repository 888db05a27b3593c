//! Per-connection session: framed reads into the engine queue, framed
//! writes of the notifications routed to this trader.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace, warn};

use super::{OutboundRx, OutboundTx, SessionRegistry};
use crate::command::{Notification, NotificationKind, RejectReason};
use crate::engine::EngineHandle;
use crate::error::{EngineError, WireError};
use crate::wire::{OrderMessage, Packet, TAG_ORDER};

const READ_BUFFER: usize = 8 * 1024;

/// Run the session I/O for a single connection.
///
/// The session is already registered under `trader_id`; it is removed
/// again however the session ends.
pub(super) async fn run_session(
    trader_id: u32,
    stream: TcpStream,
    engine: EngineHandle,
    out_tx: OutboundTx,
    out_rx: OutboundRx,
    sessions: SessionRegistry,
) -> Result<(), WireError> {
    let (reader, writer) = stream.into_split();

    let writer = tokio::spawn(write_loop(trader_id, writer, out_rx));
    let result = read_loop(trader_id, reader, &engine, &out_tx).await;

    sessions.write().await.remove(&trader_id);
    drop(out_tx);

    // With the registry entry and our sender gone the writer drains and exits.
    match writer.await {
        Ok(Err(err)) => debug!(trader = trader_id, error = %err, "writer stopped"),
        Err(err) => warn!(trader = trader_id, error = %err, "writer task failed"),
        Ok(Ok(())) => {}
    }

    result
}

async fn read_loop(
    trader_id: u32,
    mut reader: OwnedReadHalf,
    engine: &EngineHandle,
    out_tx: &OutboundTx,
) -> Result<(), WireError> {
    let mut buf = BytesMut::with_capacity(READ_BUFFER);

    loop {
        if reader.read_buf(&mut buf).await? == 0 {
            if !buf.is_empty() {
                debug!(trader = trader_id, pending = buf.len(), "disconnected mid-frame");
            }
            return Ok(());
        }

        loop {
            let packet = match Packet::decode(&mut buf) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(err) => {
                    warn!(trader = trader_id, error = %err, "protocol error, closing session");
                    return Err(err);
                }
            };

            if packet.tag != TAG_ORDER.as_bytes() {
                warn!(trader = trader_id, tag = ?packet.tag_str(), "unexpected tag");
                continue;
            }

            let message: OrderMessage = match packet.payload() {
                Ok(message) => message,
                Err(err) => {
                    warn!(trader = trader_id, error = %err, "undecodable order, closing session");
                    return Err(err);
                }
            };

            match message.into_instruction(trader_id) {
                Ok(instruction) => {
                    trace!(trader = trader_id, ?instruction, "submit");
                    if let Err(EngineError::QueueClosed) = engine.submit(instruction).await {
                        warn!(trader = trader_id, "engine stopped, closing session");
                        return Ok(());
                    }
                }
                Err(err) => {
                    warn!(trader = trader_id, error = %err, "rejecting instruction");
                    let rejected = Notification {
                        trader_id,
                        kind: NotificationKind::Rejected(RejectReason::UnsupportedKind),
                        trade_id: message.trade_id,
                        instrument_id: message.instrument_id,
                        price: message.price,
                        quantity: message.quantity,
                    };
                    if out_tx.try_send(rejected).is_err() {
                        warn!(trader = trader_id, "outbound queue full, rejection dropped");
                    }
                }
            }
        }
    }
}

async fn write_loop(
    trader_id: u32,
    mut writer: OwnedWriteHalf,
    mut out_rx: OutboundRx,
) -> Result<(), WireError> {
    let mut buf = BytesMut::with_capacity(READ_BUFFER);

    Packet::trader_session(trader_id)?.encode(&mut buf)?;
    writer.write_all(&buf).await?;

    while let Some(notification) = out_rx.recv().await {
        buf.clear();
        Packet::notification(&notification)?.encode(&mut buf)?;
        // Batch whatever else is already queued into the same write
        while let Ok(more) = out_rx.try_recv() {
            Packet::notification(&more)?.encode(&mut buf)?;
        }
        writer.write_all(&buf).await?;
    }

    writer.shutdown().await?;
    Ok(())
}
