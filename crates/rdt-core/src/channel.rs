use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use rdt_abstract::{ChannelConfig, HEADER_LEN, RECV_BUFFER_SIZE};

use crate::trace::{TraceAction, TraceLog};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("no remote address set")]
    NotConnected,
    #[error("receive timed out")]
    Timeout,
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// Unreliable datagram wrapper: one OS UDP socket plus the simulated
/// impairment pipeline.
///
/// Loss and corruption are applied on the way out, latency in both
/// directions, all driven by an RNG seeded from the config so a test run is
/// reproducible. With [`ChannelConfig::ideal`] the pipeline is inert and
/// this is a plain timeout-guarded UDP socket.
pub struct LossyChannel {
    socket: UdpSocket,
    local_addr: SocketAddr,
    remote_addr: Option<SocketAddr>,
    config: ChannelConfig,
    rng: StdRng,
    trace: TraceLog,
    forced_drops: u32,
}

impl LossyChannel {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        config: ChannelConfig,
        trace: TraceLog,
    ) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(config.socket_timeout()))?;
        let local_addr = socket.local_addr()?;
        debug!(%local_addr, "channel bound");
        Ok(Self {
            socket,
            local_addr,
            remote_addr: None,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            trace,
            forced_drops: 0,
        })
    }

    /// Register a deterministic fault: drop the next outbound frame,
    /// regardless of the loss probability. Stackable.
    pub fn add_drop_send_once(&mut self) {
        self.forced_drops += 1;
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Set the peer address. Transmits nothing.
    pub fn connect(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    /// Push one frame through the impairment pipeline to the peer.
    ///
    /// A simulated loss returns `Ok` without transmitting, exactly as a real
    /// network would swallow the datagram.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), ChannelError> {
        let remote = self.remote_addr.ok_or(ChannelError::NotConnected)?;

        if self.forced_drops > 0 {
            self.forced_drops -= 1;
            debug!(len = frame.len(), "deterministically dropping frame");
            self.trace
                .record(TraceAction::Dropped, self.local_addr, remote, frame);
            return Ok(());
        }

        if self.rng.random::<f64>() < self.config.loss_prob {
            debug!(len = frame.len(), "frame lost in channel");
            self.trace
                .record(TraceAction::Dropped, self.local_addr, remote, frame);
            return Ok(());
        }

        let mut corrupted;
        let wire: &[u8] = if self.rng.random::<f64>() < self.config.corrupt_prob {
            corrupted = frame.to_vec();
            self.corrupt_payload(&mut corrupted);
            &corrupted
        } else {
            frame
        };

        self.simulate_delay();
        self.socket.send_to(wire, remote)?;
        self.trace
            .record(TraceAction::Sent, self.local_addr, remote, wire);
        Ok(())
    }

    /// Receive one frame, honoring the configured OS timeout.
    ///
    /// The first datagram's source is adopted as the peer when none is set
    /// (trust-on-first-use).
    pub fn receive(&mut self) -> Result<(Vec<u8>, SocketAddr), ChannelError> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (len, addr) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                return Err(ChannelError::Timeout)
            }
            Err(err) => return Err(err.into()),
        };

        if self.remote_addr.is_none() {
            debug!(%addr, "adopting peer address from first datagram");
            self.remote_addr = Some(addr);
        }

        self.simulate_delay();

        let frame = buf[..len].to_vec();
        self.trace
            .record(TraceAction::Received, addr, self.local_addr, &frame);
        Ok((frame, addr))
    }

    /// XOR roughly half the payload bytes with 0xFF at uniformly sampled
    /// indices. The header survives so type, seq and declared length stay
    /// readable; only the checksum can tell.
    fn corrupt_payload(&mut self, frame: &mut [u8]) {
        if frame.len() <= HEADER_LEN {
            return;
        }
        let payload = &mut frame[HEADER_LEN..];
        let flips = payload.len() / 2;
        for idx in index::sample(&mut self.rng, payload.len(), flips) {
            payload[idx] ^= 0xFF;
        }
        debug!(flips, "frame corrupted in channel");
    }

    fn simulate_delay(&mut self) {
        if self.config.max_delay_ms == 0 {
            return;
        }
        let delay = self
            .rng
            .random_range(self.config.min_delay_ms..=self.config.max_delay_ms);
        thread::sleep(Duration::from_millis(delay));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdt_abstract::Packet;

    fn bind_pair(a: ChannelConfig, b: ChannelConfig) -> (LossyChannel, LossyChannel) {
        let mut left = LossyChannel::bind("127.0.0.1:0", a, TraceLog::disabled()).unwrap();
        let mut right = LossyChannel::bind("127.0.0.1:0", b, TraceLog::disabled()).unwrap();
        let (left_addr, right_addr) = (left.local_addr(), right.local_addr());
        left.connect(right_addr);
        right.connect(left_addr);
        (left, right)
    }

    fn quick(mut config: ChannelConfig) -> ChannelConfig {
        config.socket_timeout_ms = 30;
        config
    }

    #[test]
    fn send_without_peer_fails() {
        let mut channel =
            LossyChannel::bind("127.0.0.1:0", ChannelConfig::ideal(), TraceLog::disabled())
                .unwrap();
        let frame = Packet::data(0, b"x".to_vec()).encode();
        assert!(matches!(
            channel.send(&frame),
            Err(ChannelError::NotConnected)
        ));
    }

    #[test]
    fn ideal_channel_is_transparent() {
        let config = quick(ChannelConfig::ideal());
        let (mut left, mut right) = bind_pair(config.clone(), config);
        let frame = Packet::data(1, b"HELLO".to_vec()).encode();
        left.send(&frame).unwrap();
        let (received, from) = right.receive().unwrap();
        assert_eq!(received, frame);
        assert_eq!(from, left.local_addr());
    }

    #[test]
    fn total_loss_transmits_nothing() {
        let mut config = quick(ChannelConfig::ideal());
        config.loss_prob = 1.0;
        let (mut left, mut right) = bind_pair(config.clone(), config);
        let frame = Packet::data(0, b"HELLO".to_vec()).encode();
        left.send(&frame).unwrap();
        assert!(matches!(right.receive(), Err(ChannelError::Timeout)));
    }

    #[test]
    fn corruption_spares_the_header() {
        let mut config = quick(ChannelConfig::ideal());
        config.corrupt_prob = 1.0;
        let (mut left, mut right) = bind_pair(config.clone(), config);
        let frame = Packet::data(1, b"HELLO WORLD".to_vec()).encode();
        left.send(&frame).unwrap();
        let (received, _) = right.receive().unwrap();

        let packet = Packet::decode(&received).unwrap();
        assert_eq!(packet.seq, 1);
        assert_eq!(packet.payload.len(), 11);
        assert!(packet.is_corrupt());
    }

    #[test]
    fn first_datagram_source_becomes_peer() {
        let config = quick(ChannelConfig::ideal());
        let mut listener =
            LossyChannel::bind("127.0.0.1:0", config.clone(), TraceLog::disabled()).unwrap();
        let mut caller =
            LossyChannel::bind("127.0.0.1:0", config, TraceLog::disabled()).unwrap();
        caller.connect(listener.local_addr());

        assert_eq!(listener.remote_addr(), None);
        let frame = Packet::data(0, b"hi".to_vec()).encode();
        caller.send(&frame).unwrap();
        listener.receive().unwrap();
        assert_eq!(listener.remote_addr(), Some(caller.local_addr()));

        // And the adopted peer is usable for the reply
        let reply = Packet::ack(0).encode();
        listener.send(&reply).unwrap();
        let (received, _) = caller.receive().unwrap();
        assert_eq!(received, reply);
    }
}
