use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest datagram the transport will put on the wire.
pub const MAX_UDP_PACKET_SIZE: usize = 1024;

/// Receive buffer, kept well above `MAX_UDP_PACKET_SIZE` so an oversized
/// datagram is observed rather than truncated.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Well-known loopback ports used by the demo pair.
pub const SENDER_PORT: u16 = 5001;
pub const RECEIVER_PORT: u16 = 5000;

/// Every impairment and timing knob of one simulated channel.
///
/// Impairment is a property of the channel, not of the endpoint, and never
/// ambient process state: each channel owns its own config and its own
/// seeded RNG, so a test can zero the probabilities or replay a seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Probability that an outbound datagram is silently dropped.
    pub loss_prob: f64,
    /// Probability that an outbound payload is corrupted (header survives).
    pub corrupt_prob: f64,
    /// Simulated one-way latency, drawn uniformly per datagram.
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// OS-level receive timeout.
    pub socket_timeout_ms: u64,
    /// ARQ retransmission timer.
    pub retransmit_timeout_ms: u64,
    /// Wall-clock budget for one `send` or `recv` call.
    pub deadline_ms: u64,
    /// Largest payload accepted by `send`.
    pub max_payload: usize,
    /// Seed for the impairment RNG.
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            loss_prob: 0.2,
            corrupt_prob: 0.2,
            min_delay_ms: 20,
            max_delay_ms: 500,
            socket_timeout_ms: 100,
            retransmit_timeout_ms: 300,
            deadline_ms: 5000,
            max_payload: 512,
            seed: 0,
        }
    }
}

impl ChannelConfig {
    /// A channel with every impairment switched off.
    pub fn ideal() -> Self {
        Self {
            loss_prob: 0.0,
            corrupt_prob: 0.0,
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// Partial channel settings, e.g. parsed from a TOML file, layered over a
/// base config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelConfigOverride {
    pub loss_prob: Option<f64>,
    pub corrupt_prob: Option<f64>,
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub socket_timeout_ms: Option<u64>,
    pub retransmit_timeout_ms: Option<u64>,
    pub deadline_ms: Option<u64>,
    pub max_payload: Option<usize>,
    pub seed: Option<u64>,
}

impl ChannelConfigOverride {
    pub fn apply_to(&self, config: &mut ChannelConfig) {
        if let Some(v) = self.loss_prob {
            config.loss_prob = v;
        }
        if let Some(v) = self.corrupt_prob {
            config.corrupt_prob = v;
        }
        if let Some(v) = self.min_delay_ms {
            config.min_delay_ms = v;
        }
        if let Some(v) = self.max_delay_ms {
            config.max_delay_ms = v;
        }
        if let Some(v) = self.socket_timeout_ms {
            config.socket_timeout_ms = v;
        }
        if let Some(v) = self.retransmit_timeout_ms {
            config.retransmit_timeout_ms = v;
        }
        if let Some(v) = self.deadline_ms {
            config.deadline_ms = v;
        }
        if let Some(v) = self.max_payload {
            config.max_payload = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
    }
}
