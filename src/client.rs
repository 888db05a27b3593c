//! Minimal async trader connection, the counterpart of a server session.
//!
//! Connecting waits for the `t_1000` handshake, so a connected client
//! always knows its trader id.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

use crate::command::{Instruction, InstructionKind};
use crate::error::WireError;
use crate::wire::{OrderMessage, Packet, TradeSession, TAG_TRADER_SESSION};

/// A message received from the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    /// Envelope tag, e.g. `t_1001`
    pub tag: String,
    pub message: OrderMessage,
}

pub struct TraderClient {
    stream: TcpStream,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    trader_id: u32,
    next_trade_id: u32,
}

impl TraderClient {
    /// Connect and wait for the session handshake.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, WireError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let mut client = Self {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
            trader_id: 0,
            next_trade_id: 1,
        };

        let handshake = client
            .read_packet()
            .await?
            .ok_or(WireError::InvalidHeader("closed before handshake"))?;
        if handshake.tag != TAG_TRADER_SESSION.as_bytes() {
            return Err(WireError::InvalidHeader("expected trader session handshake"));
        }
        client.trader_id = handshake.payload::<TradeSession>()?.trader_id;
        debug!(trader = client.trader_id, "connected");

        Ok(client)
    }

    /// Trader id assigned by the server
    pub fn trader_id(&self) -> u32 {
        self.trader_id
    }

    /// Send a raw order message as-is.
    pub async fn send(&mut self, message: &OrderMessage) -> Result<(), WireError> {
        self.write_buffer.clear();
        Packet::order(message)?.encode(&mut self.write_buffer)?;
        self.stream.write_all(&self.write_buffer).await?;
        Ok(())
    }

    /// Send a buy with the next trade id, returning that id.
    pub async fn buy(&mut self, instrument_id: u64, price: u64, quantity: u64) -> Result<u32, WireError> {
        self.place(InstructionKind::Buy, instrument_id, price, quantity).await
    }

    /// Send a sell with the next trade id, returning that id.
    pub async fn sell(&mut self, instrument_id: u64, price: u64, quantity: u64) -> Result<u32, WireError> {
        self.place(InstructionKind::Sell, instrument_id, price, quantity).await
    }

    pub async fn cancel(&mut self, trade_id: u32, instrument_id: u64) -> Result<(), WireError> {
        let cancel = Instruction::cancel(self.trader_id, trade_id, instrument_id);
        self.send(&OrderMessage::from(&cancel)).await
    }

    async fn place(
        &mut self,
        kind: InstructionKind,
        instrument_id: u64,
        price: u64,
        quantity: u64,
    ) -> Result<u32, WireError> {
        let trade_id = self.next_trade_id;
        self.next_trade_id += 1;

        let instruction = Instruction {
            kind,
            trader_id: self.trader_id,
            trade_id,
            instrument_id,
            price,
            quantity,
        };
        self.send(&OrderMessage::from(&instruction)).await?;
        Ok(trade_id)
    }

    /// Next message from the server, or `None` once it hangs up.
    pub async fn recv(&mut self) -> Result<Option<Received>, WireError> {
        let Some(packet) = self.read_packet().await? else {
            return Ok(None);
        };
        Ok(Some(Received {
            tag: packet.tag_str().unwrap_or_default().to_string(),
            message: packet.payload()?,
        }))
    }

    async fn read_packet(&mut self) -> Result<Option<Packet>, WireError> {
        loop {
            if let Some(packet) = Packet::decode(&mut self.read_buffer)? {
                return Ok(Some(packet));
            }
            if self.stream.read_buf(&mut self.read_buffer).await? == 0 {
                return Ok(None);
            }
        }
    }
}
