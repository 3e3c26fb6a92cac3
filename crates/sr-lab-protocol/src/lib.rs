//! Selective-Repeat ARQ state machines for the lab simulator.
//!
//! [`SrSender`] and [`SrReceiver`] implement the simplex data-transfer
//! protocol: per-packet acknowledgments, out-of-order buffering on the
//! receive side, and timeout-driven retransmission of individually
//! unacknowledged packets. Both plug into any [`SystemContext`] host —
//! the discrete-event simulator, or [`testing::RecordingContext`] in
//! unit tests.

pub mod receiver;
pub mod sender;
pub mod testing;

pub use receiver::SrReceiver;
pub use sender::SrSender;
pub use sr_lab_abstract::{Packet, SystemContext, TransportProtocol};

/// Window size used by the canonical lab configuration.
pub const DEFAULT_WINDOW_SIZE: u32 = 6;

pub fn sender() -> Box<dyn TransportProtocol> {
    Box::new(SrSender::new(DEFAULT_WINDOW_SIZE))
}

pub fn receiver() -> Box<dyn TransportProtocol> {
    Box::new(SrReceiver::new(DEFAULT_WINDOW_SIZE))
}
