//! Selective-Repeat receive-side state machine.
//!
//! Every uncorrupted packet is acknowledged individually the moment it
//! arrives, whether or not it is new; packets inside the acceptance window
//! are buffered by sequence number and handed to the application only once
//! a contiguous run is available at the delivery frontier.

use sr_lab_abstract::{Packet, SystemContext, TransportProtocol, UNUSED};

/// Selective-Repeat receive-side state for one entity.
///
/// The receiver never retransmits on its own timer and never originates
/// data in this simplex configuration; the corresponding handlers exist
/// structurally but are inert.
pub struct SrReceiver {
    window_size: u32,
    seq_space: u32,

    /// Lowest sequence number not yet delivered to the application.
    expected_seq: u32,
    /// Out-of-order packets held until the frontier reaches them.
    buffer: Vec<Option<Packet>>,
    /// Per-sequence-number received flag.
    received: Vec<bool>,

    /// Payloads delivered to the application layer.
    pub packets_delivered: u64,
}

impl SrReceiver {
    /// Create a receiver with the canonical `seq_space = 2 × window_size`.
    pub fn new(window_size: u32) -> Self {
        Self::with_seq_space(window_size, window_size * 2)
    }

    /// Create a receiver with an explicit sequence space; see
    /// [`SrSender::with_seq_space`](crate::SrSender::with_seq_space).
    pub fn with_seq_space(window_size: u32, seq_space: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        assert!(
            seq_space > window_size,
            "seq_space must exceed window_size ({seq_space} <= {window_size})"
        );
        Self {
            window_size,
            seq_space,
            expected_seq: 0,
            buffer: vec![None; seq_space as usize],
            received: vec![false; seq_space as usize],
            packets_delivered: 0,
        }
    }

    /// Delivery frontier: the next sequence number owed to the application.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, _ctx: &mut dyn SystemContext) {
        self.expected_seq = 0;
        self.buffer.fill(None);
        self.received.fill(false);
        self.packets_delivered = 0;
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupted() {
            // No ACK either; the sender's timeout covers recovery.
            ctx.log("corrupted packet dropped");
            return;
        }
        let seq = packet.seq_num;
        if seq == UNUSED || seq >= self.seq_space {
            return;
        }

        // Per-packet, unconditional: duplicates and out-of-window arrivals
        // are acknowledged too, or a lost ACK would stall the sender forever.
        ctx.log(&format!("recv seq={seq}, ACK {seq}"));
        ctx.send_packet(Packet::ack(seq));

        let slot = seq as usize;
        let offset = (seq + self.seq_space - self.expected_seq) % self.seq_space;
        if offset < self.window_size && !self.received[slot] {
            self.received[slot] = true;
            self.buffer[slot] = Some(packet);

            while self.received[self.expected_seq as usize] {
                let front = self.expected_seq as usize;
                if let Some(buffered) = self.buffer[front].take() {
                    ctx.deliver_data(&buffered.payload);
                }
                self.received[front] = false;
                self.expected_seq = (self.expected_seq + 1) % self.seq_space;
                self.packets_delivered += 1;
                ctx.record_metric("packets_delivered", self.packets_delivered as f64);
            }
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext, _timer_id: u32) {
        // No receiver-side timers in the simplex configuration.
    }

    fn on_app_data(&mut self, _ctx: &mut dyn SystemContext, _data: &[u8]) {
        // The receiver never originates data.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn data(seq: u32, text: &str) -> Packet {
        Packet::data(seq, text.as_bytes())
    }

    fn delivered_strings(ctx: &RecordingContext) -> Vec<String> {
        ctx.delivered
            .iter()
            .map(|d| {
                String::from_utf8_lossy(d)
                    .trim_end_matches('\0')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn in_order_packet_is_acked_and_delivered() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        r.on_packet(&mut ctx, data(0, "first"));

        assert_eq!(ctx.sent.len(), 1);
        assert_eq!(ctx.sent[0].ack_num, 0);
        assert!(!ctx.sent[0].is_corrupted());
        assert_eq!(delivered_strings(&ctx), vec!["first"]);
        assert_eq!(r.expected_seq(), 1);
    }

    #[test]
    fn out_of_order_packets_deliver_in_sequence() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        r.on_packet(&mut ctx, data(2, "third"));
        r.on_packet(&mut ctx, data(1, "second"));
        assert!(ctx.delivered.is_empty());

        r.on_packet(&mut ctx, data(0, "first"));
        assert_eq!(delivered_strings(&ctx), vec!["first", "second", "third"]);
        assert_eq!(r.packets_delivered, 3);
        assert_eq!(r.expected_seq(), 3);
    }

    #[test]
    fn duplicate_is_acked_but_not_redelivered() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        r.on_packet(&mut ctx, data(0, "once"));
        r.on_packet(&mut ctx, data(0, "once"));

        assert_eq!(ctx.sent.len(), 2);
        assert_eq!(ctx.delivered.len(), 1);
        assert_eq!(r.packets_delivered, 1);
    }

    #[test]
    fn buffered_duplicate_is_acked_but_not_rebuffered() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        r.on_packet(&mut ctx, data(2, "later"));
        r.on_packet(&mut ctx, data(2, "later"));

        assert_eq!(ctx.sent.len(), 2);
        assert!(ctx.delivered.is_empty());
    }

    #[test]
    fn corrupted_packet_gets_no_ack_and_no_delivery() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        let mut packet = data(0, "mangled");
        packet.payload[3] = packet.payload[3].wrapping_add(1);
        r.on_packet(&mut ctx, packet);

        assert!(ctx.sent.is_empty());
        assert!(ctx.delivered.is_empty());
        assert_eq!(r.expected_seq(), 0);
    }

    #[test]
    fn out_of_window_packet_is_acked_but_not_buffered() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        // Expected frontier is 0, so 7 falls outside [0, 6).
        r.on_packet(&mut ctx, data(7, "early"));
        assert_eq!(ctx.sent.len(), 1);
        assert_eq!(ctx.sent[0].ack_num, 7);
        assert!(ctx.delivered.is_empty());

        for seq in 0..6 {
            r.on_packet(&mut ctx, data(seq, &format!("msg-{seq}")));
        }
        // Seq 7 was never buffered, so delivery stops at the six real ones.
        assert_eq!(ctx.delivered.len(), 6);
        assert_eq!(r.expected_seq(), 6);
    }

    #[test]
    fn stale_retransmission_is_acked_but_rejected() {
        let mut r = SrReceiver::new(6);
        let mut ctx = RecordingContext::new();

        for seq in 0..3 {
            r.on_packet(&mut ctx, data(seq, &format!("msg-{seq}")));
        }
        assert_eq!(r.expected_seq(), 3);

        // A retransmitted old packet: with seq_space = 2 × window the
        // acceptance test must classify it as behind the window.
        r.on_packet(&mut ctx, data(0, "msg-0"));
        assert_eq!(ctx.sent.last().map(|p| p.ack_num), Some(0));
        assert_eq!(ctx.delivered.len(), 3);
        assert_eq!(r.expected_seq(), 3);
    }

    #[test]
    fn delivery_continues_across_sequence_wrap() {
        let mut r = SrReceiver::with_seq_space(3, 6);
        let mut ctx = RecordingContext::new();

        for seq in [0, 1, 2, 4, 5, 3, 0, 1] {
            r.on_packet(&mut ctx, data(seq, &format!("wrap-{seq}")));
        }

        // 4 and 5 waited for 3; the trailing 0 and 1 are the second lap.
        assert_eq!(
            delivered_strings(&ctx),
            vec![
                "wrap-0", "wrap-1", "wrap-2", "wrap-3", "wrap-4", "wrap-5", "wrap-0", "wrap-1"
            ]
        );
        assert_eq!(r.packets_delivered, 8);
        assert_eq!(r.expected_seq(), 2);
    }
}
