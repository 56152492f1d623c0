//! Wire message definitions: event names, outbound payloads, and the
//! framing formats of the two transports.

pub mod envelope;
pub mod names;
pub mod packet;
pub mod types;

pub use envelope::SocketEnvelope;
pub use packet::{OpenFrame, Packet};
