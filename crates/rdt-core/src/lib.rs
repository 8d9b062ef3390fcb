//! Stop-and-wait reliable message transport over UDP.
//!
//! Three pieces, bottom-up: [`LossyChannel`] owns the OS datagram socket and
//! optionally applies simulated loss, corruption and latency; [`TraceLog`]
//! records one line per channel action; [`RdtSocket`] runs the alternating-bit
//! sender and receiver state machines on top and exposes the blocking
//! `send`/`recv` endpoint API.

pub mod channel;
pub mod socket;
pub mod trace;

pub use channel::{ChannelError, LossyChannel};
pub use socket::RdtSocket;
pub use trace::{TraceAction, TraceLog};
