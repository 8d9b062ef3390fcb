pub mod config;
pub mod packet;

pub use config::{ChannelConfig, ChannelConfigOverride};
pub use config::{MAX_UDP_PACKET_SIZE, RECEIVER_PORT, RECV_BUFFER_SIZE, SENDER_PORT};
pub use packet::{ACK_PAYLOAD, HEADER_LEN, Packet, PacketType, WireError, checksum, peek_header};
