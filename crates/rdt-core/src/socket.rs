use std::net::{SocketAddr, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use rdt_abstract::{ChannelConfig, Packet, PacketType};

use crate::channel::{ChannelError, LossyChannel};
use crate::trace::TraceLog;

/// Pause between ACK polls so the wait loop does not spin.
const ACK_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Ready,
    AwaitAck0,
    AwaitAck1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvState {
    AwaitPkt0,
    AwaitPkt1,
}

impl RecvState {
    fn expected_seq(self) -> u8 {
        match self {
            RecvState::AwaitPkt0 => 0,
            RecvState::AwaitPkt1 => 1,
        }
    }

    fn toggled(self) -> Self {
        match self {
            RecvState::AwaitPkt0 => RecvState::AwaitPkt1,
            RecvState::AwaitPkt1 => RecvState::AwaitPkt0,
        }
    }
}

/// Bidirectional stop-and-wait endpoint over one UDP socket.
///
/// `send` and `recv` are synchronous and blocking: each owns the underlying
/// socket until it finishes, reading every inbound frame to find what it
/// waits for. The endpoint is therefore a single-flow object; two-way
/// traffic must alternate strictly (request/response), or use one endpoint
/// per direction. A DATA frame arriving during a `send` is dropped, not
/// queued.
pub struct RdtSocket {
    channel: Option<LossyChannel>,
    config: ChannelConfig,
    trace: TraceLog,

    send_state: SendState,
    send_seq: u8,
    last_frame: Option<Vec<u8>>,
    last_send_time: Instant,

    recv_state: RecvState,
}

impl RdtSocket {
    /// Bind a UDP socket; port 0 picks an ephemeral port.
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        config: ChannelConfig,
        trace: TraceLog,
    ) -> Result<Self, ChannelError> {
        let channel = LossyChannel::bind(addr, config.clone(), trace.clone())?;
        info!(local = %channel.local_addr(), "rdt socket bound");
        Ok(Self {
            channel: Some(channel),
            config,
            trace,
            send_state: SendState::Ready,
            send_seq: 0,
            last_frame: None,
            last_send_time: Instant::now(),
            recv_state: RecvState::AwaitPkt0,
        })
    }

    /// Rebind to a new local address, closing the current socket first.
    /// Protocol state is untouched.
    pub fn rebind<A: ToSocketAddrs>(&mut self, addr: A) -> Result<(), ChannelError> {
        self.channel = None;
        let channel = LossyChannel::bind(addr, self.config.clone(), self.trace.clone())?;
        info!(local = %channel.local_addr(), "rdt socket rebound");
        self.channel = Some(channel);
        Ok(())
    }

    /// Set the peer address. Transmits nothing.
    pub fn connect(&mut self, addr: SocketAddr) -> Result<(), ChannelError> {
        let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
        channel.connect(addr);
        info!(remote = %addr, "rdt socket connected");
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.channel.as_ref().map(LossyChannel::local_addr)
    }

    /// The bit the next DATA packet will carry.
    pub fn send_seq(&self) -> u8 {
        self.send_seq
    }

    /// The bit the next in-order delivery must carry.
    pub fn expected_recv_seq(&self) -> u8 {
        self.recv_state.expected_seq()
    }

    /// Register a deterministic fault on the underlying channel: drop the
    /// next outbound frame (DATA or ACK). Test hook; no-op when closed.
    pub fn add_drop_send_once(&mut self) {
        if let Some(channel) = self.channel.as_mut() {
            channel.add_drop_send_once();
        }
    }

    /// Release the socket. Idempotent.
    pub fn close(&mut self) {
        if let Some(channel) = self.channel.take() {
            info!(local = %channel.local_addr(), "rdt socket closed");
        }
    }

    /// Send one message and wait for its acknowledgement.
    ///
    /// `true` means the peer acknowledged this exact message. `false` means
    /// the operation deadline expired or the socket failed; the peer may or
    /// may not have received the data, so `false` is indeterminate, not
    /// proof of non-delivery.
    pub fn send(&mut self, data: &[u8]) -> bool {
        if self.send_state != SendState::Ready {
            warn!(state = ?self.send_state, "send called while an ACK is outstanding");
            return false;
        }
        if data.len() > self.config.max_payload {
            warn!(
                len = data.len(),
                max = self.config.max_payload,
                "payload exceeds maximum"
            );
            return false;
        }
        let Some(channel) = self.channel.as_mut() else {
            warn!("send on closed socket");
            return false;
        };

        let frame = Packet::data(self.send_seq, data.to_vec()).encode();
        if let Err(err) = channel.send(&frame) {
            warn!(%err, "initial transmit failed");
            return false;
        }
        self.last_frame = Some(frame);
        self.last_send_time = Instant::now();
        self.send_state = if self.send_seq == 0 {
            SendState::AwaitAck0
        } else {
            SendState::AwaitAck1
        };
        debug!(seq = self.send_seq, state = ?self.send_state, "awaiting ACK");

        let deadline = Instant::now() + self.config.deadline();
        loop {
            if Instant::now() > deadline {
                warn!(seq = self.send_seq, "deadline expired waiting for ACK, giving up");
                self.send_state = SendState::Ready;
                self.last_frame = None;
                return false;
            }

            match self.poll_ack() {
                Ok(true) => return true,
                Ok(false) => {}
                Err(err) => {
                    error!(%err, "socket failed while waiting for ACK");
                    self.send_state = SendState::Ready;
                    self.last_frame = None;
                    return false;
                }
            }

            if self.last_send_time.elapsed() >= self.config.retransmit_timeout() {
                self.retransmit();
            }

            thread::sleep(ACK_POLL_INTERVAL);
        }
    }

    /// Receive the next in-order message.
    ///
    /// `None` means the operation deadline passed without a deliverable
    /// DATA packet, or the socket failed. The receive state is kept, so a
    /// later `recv` resumes where this one gave up.
    pub fn recv(&mut self) -> Option<Vec<u8>> {
        let deadline = Instant::now() + self.config.deadline();
        loop {
            if Instant::now() > deadline {
                warn!("deadline expired waiting for data, giving up");
                return None;
            }
            let Some(channel) = self.channel.as_mut() else {
                warn!("recv on closed socket");
                return None;
            };

            let (frame, _) = match channel.receive() {
                Ok(received) => received,
                Err(ChannelError::Timeout) => continue,
                Err(err) => {
                    error!(%err, "socket failed while waiting for data");
                    return None;
                }
            };

            let packet = match Packet::decode(&frame) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!(%err, "dropping malformed frame");
                    continue;
                }
            };

            let corrupt = packet.is_corrupt();

            // A clean non-DATA frame is a stale ACK from an earlier
            // exchange; it is not data and must never reach the caller.
            if !corrupt && packet.packet_type != PacketType::Data {
                debug!(seq = packet.seq, "stale ACK skipped");
                continue;
            }

            let expected = self.recv_state.expected_seq();
            if !corrupt && packet.seq == expected {
                self.send_ack(expected);
                self.recv_state = self.recv_state.toggled();
                debug!(seq = expected, state = ?self.recv_state, "in-order data delivered");
                return Some(packet.payload);
            }

            // Corrupt, or a retransmission of the already-delivered packet:
            // re-ACK the previous bit and stay in the same state.
            let other = 1 - expected;
            if corrupt {
                debug!(re_ack = other, "corrupt frame, re-ACKing previous bit");
            } else {
                debug!(seq = packet.seq, expected, re_ack = other, "duplicate data, re-ACKing");
            }
            self.send_ack(other);
        }
    }

    /// Read one frame and process it as a candidate ACK. `Ok(true)` when
    /// the awaited ACK arrived and the FSM advanced.
    fn poll_ack(&mut self) -> Result<bool, ChannelError> {
        let channel = self.channel.as_mut().ok_or(ChannelError::NotConnected)?;
        let (frame, _) = match channel.receive() {
            Ok(received) => received,
            Err(ChannelError::Timeout) => return Ok(false),
            Err(err) => return Err(err),
        };

        let packet = match Packet::decode(&frame) {
            Ok(packet) => packet,
            Err(err) => {
                debug!(%err, "dropping malformed frame");
                return Ok(false);
            }
        };
        if packet.packet_type != PacketType::Ack {
            // Data arriving mid-send; the single-flow discipline drops it.
            debug!(seq = packet.seq, "data frame during send, dropped");
            return Ok(false);
        }
        if packet.is_corrupt() {
            debug!(seq = packet.seq, "corrupt ACK ignored");
            return Ok(false);
        }

        let expected = match self.send_state {
            SendState::AwaitAck0 => 0,
            SendState::AwaitAck1 => 1,
            SendState::Ready => return Ok(false),
        };
        if packet.seq == expected {
            self.send_state = SendState::Ready;
            self.send_seq = 1 - self.send_seq;
            debug!(ack = packet.seq, "ACK accepted");
            Ok(true)
        } else {
            debug!(ack = packet.seq, expected, "duplicate ACK ignored");
            Ok(false)
        }
    }

    fn retransmit(&mut self) {
        let Some(channel) = self.channel.as_mut() else { return };
        let Some(frame) = self.last_frame.as_ref() else { return };
        debug!(seq = self.send_seq, "retransmit timer fired, resending");
        if let Err(err) = channel.send(frame) {
            warn!(%err, "retransmit failed");
        }
        self.last_send_time = Instant::now();
    }

    fn send_ack(&mut self, seq: u8) {
        let Some(channel) = self.channel.as_mut() else { return };
        let frame = Packet::ack(seq).encode();
        if let Err(err) = channel.send(&frame) {
            warn!(%err, seq, "failed to send ACK");
        }
    }
}

impl Drop for RdtSocket {
    fn drop(&mut self) {
        self.close();
    }
}
