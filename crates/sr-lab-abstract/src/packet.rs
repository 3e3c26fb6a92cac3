use serde::{Deserialize, Serialize};

/// Fixed payload length of every packet on the wire. Shorter application
/// messages are zero-padded; longer ones are truncated.
pub const PAYLOAD_LEN: usize = 20;

/// Sentinel for header fields that carry no meaning on a given packet
/// (the ack field of a data packet in this simplex configuration).
pub const UNUSED: u32 = u32::MAX;

/// Filler byte for the payload of pure acknowledgment packets.
const ACK_FILLER: u8 = b'0';

/// The fixed-size wire record exchanged between sender and receiver.
///
/// The checksum covers the sequence number, the acknowledgment number and
/// every payload byte; the channel may mutate any subset of those, and any
/// single uncompensated mutation changes the sum. This is a transport-layer
/// sanity check, not a security mechanism.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Packet {
    /// Sequence number in `[0, seq_space)`, or [`UNUSED`].
    pub seq_num: u32,
    /// Acknowledgment number, meaningful only on receiver-to-sender packets.
    pub ack_num: u32,
    /// Fixed-size payload buffer.
    pub payload: [u8; PAYLOAD_LEN],
    /// Sum of `seq_num`, `ack_num` and all payload bytes, wrapping.
    pub checksum: u32,
}

impl Packet {
    /// Build a data packet carrying `message`, checksum filled in.
    pub fn data(seq_num: u32, message: &[u8]) -> Self {
        let mut payload = [0u8; PAYLOAD_LEN];
        let len = message.len().min(PAYLOAD_LEN);
        payload[..len].copy_from_slice(&message[..len]);

        let mut packet = Self {
            seq_num,
            ack_num: UNUSED,
            payload,
            checksum: 0,
        };
        packet.checksum = packet.compute_checksum();
        packet
    }

    /// Build an acknowledgment for `seq_num`, echoing it in both header
    /// fields over a filler payload.
    pub fn ack(seq_num: u32) -> Self {
        let mut packet = Self {
            seq_num,
            ack_num: seq_num,
            payload: [ACK_FILLER; PAYLOAD_LEN],
            checksum: 0,
        };
        packet.checksum = packet.compute_checksum();
        packet
    }

    /// Recompute the checksum over the packet's current field values.
    pub fn compute_checksum(&self) -> u32 {
        let mut sum = self.seq_num.wrapping_add(self.ack_num);
        for &byte in &self.payload {
            sum = sum.wrapping_add(byte as u32);
        }
        sum
    }

    /// `true` when the stored checksum no longer matches the fields.
    pub fn is_corrupted(&self) -> bool {
        self.compute_checksum() != self.checksum
    }
}
