//! Selective-Repeat send-side state machine.
//!
//! [`SrSender`] keeps up to `window_size` packets in flight and tracks an
//! acknowledgment flag per sequence number, so a timeout retransmits only
//! the packets still missing an ACK rather than the whole window.
//!
//! # Protocol contract
//!
//! - Sequence numbers live in `[0, seq_space)` with
//!   `seq_space = 2 × window_size`; the doubled space is what lets the
//!   receiver tell a retransmitted old packet from a new one on an
//!   order-preserving channel.
//! - ACKs are per-packet, not cumulative: one ACK acknowledges exactly the
//!   sequence number it echoes.
//! - One retransmission timer exists at a time and always tracks the
//!   oldest unacknowledged packet.
//!
//! ```text
//!      base            next_seq
//!       │                  │
//!  ─────┼──────────────────┼──────────────────▶ seq space (mod 2N)
//!       │ <── in flight ──▶│ <── assignable ─▶
//! ```

use sr_lab_abstract::{Packet, SystemContext, TransportProtocol, UNUSED};

/// Timer id of the single retransmission timer.
pub const RETRANSMIT_TIMER: u32 = 0;

/// Round-trip timeout before unacknowledged packets are resent.
pub const RETRANSMIT_TIMEOUT_MS: u64 = 1600;

/// Selective-Repeat send-side state for one entity.
pub struct SrSender {
    window_size: u32,
    seq_space: u32,
    timeout_ms: u64,

    /// Oldest sequence number not yet acknowledged (left window edge).
    base: u32,
    /// Next sequence number to assign to an outbound message.
    next_seq: u32,
    /// Last packet sent per sequence number, indexed directly by it.
    /// Slots outside `[base, next_seq)` are logically empty.
    buffer: Vec<Option<Packet>>,
    /// Per-sequence-number acknowledgment flag.
    acked: Vec<bool>,
    /// Whether the retransmission timer is currently running.
    timer_armed: bool,

    /// Messages rejected because the window was full.
    pub window_full: u64,
    /// Acknowledgments accepted for the first time.
    pub new_acks: u64,
    /// Packets retransmitted after a timeout.
    pub packets_resent: u64,
}

impl SrSender {
    /// Create a sender with the canonical `seq_space = 2 × window_size`.
    pub fn new(window_size: u32) -> Self {
        Self::with_seq_space(window_size, window_size * 2)
    }

    /// Create a sender with an explicit sequence space.
    ///
    /// Spaces smaller than `2 × window_size` break Selective-Repeat
    /// disambiguation; the constructor allows them so the failure mode can
    /// be demonstrated in tests.
    pub fn with_seq_space(window_size: u32, seq_space: u32) -> Self {
        assert!(window_size >= 1, "window_size must be at least 1");
        assert!(
            seq_space > window_size,
            "seq_space must exceed window_size ({seq_space} <= {window_size})"
        );
        Self {
            window_size,
            seq_space,
            timeout_ms: RETRANSMIT_TIMEOUT_MS,
            base: 0,
            next_seq: 0,
            buffer: vec![None; seq_space as usize],
            acked: vec![false; seq_space as usize],
            timer_armed: false,
            window_full: 0,
            new_acks: 0,
            packets_resent: 0,
        }
    }

    /// Left edge of the send window.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Next sequence number to be assigned.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    /// Number of assigned-but-unacknowledged sequence numbers.
    pub fn in_flight(&self) -> u32 {
        (self.next_seq + self.seq_space - self.base) % self.seq_space
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, _ctx: &mut dyn SystemContext) {
        self.base = 0;
        self.next_seq = 0;
        self.buffer.fill(None);
        self.acked.fill(false);
        self.timer_armed = false;
        self.window_full = 0;
        self.new_acks = 0;
        self.packets_resent = 0;
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &[u8]) {
        if self.in_flight() >= self.window_size {
            self.window_full += 1;
            ctx.record_metric("window_full", self.window_full as f64);
            ctx.log(&format!(
                "window full, dropping {}-byte message",
                data.len()
            ));
            return;
        }

        let packet = Packet::data(self.next_seq, data);
        let slot = self.next_seq as usize;
        self.buffer[slot] = Some(packet.clone());
        self.acked[slot] = false;

        ctx.log(&format!("send seq={} ({} bytes)", self.next_seq, data.len()));
        ctx.send_packet(packet);

        if !self.timer_armed {
            ctx.start_timer(self.timeout_ms, RETRANSMIT_TIMER);
            self.timer_armed = true;
        }
        self.next_seq = (self.next_seq + 1) % self.seq_space;
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if packet.is_corrupted() {
            ctx.log("corrupted ACK dropped");
            return;
        }
        let ack = packet.ack_num;
        if ack == UNUSED || ack >= self.seq_space {
            // Nothing we could ever have sent carries this number.
            return;
        }
        // An ack outside [base, next_seq) references a packet the window has
        // already slid past: a duplicate from an earlier round. Without this
        // guard the slide-time flag clearing would make it look new again.
        let offset = (ack + self.seq_space - self.base) % self.seq_space;
        let slot = ack as usize;
        if offset >= self.in_flight() || self.acked[slot] {
            ctx.log(&format!("duplicate ACK {ack}"));
            return;
        }

        self.acked[slot] = true;
        self.new_acks += 1;
        ctx.record_metric("new_acks", self.new_acks as f64);
        ctx.log(&format!("new ACK {ack}"));

        while self.acked[self.base as usize] {
            self.acked[self.base as usize] = false;
            self.buffer[self.base as usize] = None;
            self.base = (self.base + 1) % self.seq_space;
        }

        // The deadline always tracks the current oldest unacked packet:
        // stop, then restart for a fresh round trip while anything remains
        // in flight.
        ctx.cancel_timer(RETRANSMIT_TIMER);
        if self.base == self.next_seq {
            self.timer_armed = false;
        } else {
            ctx.start_timer(self.timeout_ms, RETRANSMIT_TIMER);
            self.timer_armed = true;
        }
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32) {
        if timer_id != RETRANSMIT_TIMER {
            return;
        }
        let in_flight = self.in_flight();
        ctx.log(&format!("timeout, {in_flight} in flight"));

        for offset in 0..in_flight {
            let seq = (self.base + offset) % self.seq_space;
            if self.acked[seq as usize] {
                continue;
            }
            if let Some(packet) = &self.buffer[seq as usize] {
                ctx.log(&format!("resend seq={seq}"));
                ctx.send_packet(packet.clone());
                self.packets_resent += 1;
                ctx.record_metric("packets_resent", self.packets_resent as f64);
            }
        }

        // The timer only fires while something is unacked, so always re-arm.
        ctx.start_timer(self.timeout_ms, RETRANSMIT_TIMER);
        self.timer_armed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingContext;

    fn submit_n(sender: &mut SrSender, ctx: &mut RecordingContext, n: usize) {
        for i in 0..n {
            sender.on_app_data(ctx, format!("message-{i:02}").as_bytes());
        }
    }

    #[test]
    fn initial_state() {
        let s = SrSender::new(6);
        assert_eq!(s.base(), 0);
        assert_eq!(s.next_seq(), 0);
        assert_eq!(s.in_flight(), 0);
    }

    #[test]
    fn submissions_are_sent_with_sequential_seqnums() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 3);

        let seqs: Vec<u32> = ctx.sent.iter().map(|p| p.seq_num).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(ctx.sent.iter().all(|p| p.ack_num == UNUSED));
        assert_eq!(s.in_flight(), 3);
    }

    #[test]
    fn seventh_submission_is_rejected_at_window_six() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 7);

        assert_eq!(ctx.sent.len(), 6);
        assert_eq!(s.window_full, 1);
        assert_eq!(s.in_flight(), 6);
        assert_eq!(s.next_seq(), 6);
    }

    #[test]
    fn in_flight_never_exceeds_window() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 20);

        assert_eq!(s.in_flight(), 6);
        assert_eq!(s.window_full, 14);
    }

    #[test]
    fn timer_armed_once_for_a_burst() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 6);

        assert_eq!(ctx.timers_started, vec![(RETRANSMIT_TIMEOUT_MS, RETRANSMIT_TIMER)]);
    }

    #[test]
    fn out_of_order_acks_slide_base_together() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 3);

        s.on_packet(&mut ctx, Packet::ack(1));
        assert_eq!(s.base(), 0);

        s.on_packet(&mut ctx, Packet::ack(0));
        assert_eq!(s.base(), 2);
        assert_eq!(s.in_flight(), 1);
    }

    #[test]
    fn duplicate_ack_is_idempotent() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 2);

        s.on_packet(&mut ctx, Packet::ack(0));
        s.on_packet(&mut ctx, Packet::ack(0));

        assert_eq!(s.new_acks, 1);
        assert_eq!(s.base(), 1);
        // Only the first ACK touched the timer.
        assert_eq!(ctx.timers_cancelled.len(), 1);
    }

    #[test]
    fn late_duplicate_after_window_slide_is_ignored() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 3);

        s.on_packet(&mut ctx, Packet::ack(0));
        assert_eq!(s.base(), 1);

        // The slot's flag was cleared by the slide; the ack must still be
        // recognized as a duplicate.
        s.on_packet(&mut ctx, Packet::ack(0));
        assert_eq!(s.new_acks, 1);
        assert_eq!(s.base(), 1);
    }

    #[test]
    fn corrupted_ack_changes_nothing() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 2);

        let mut ack = Packet::ack(0);
        ack.payload[0] = ack.payload[0].wrapping_add(1);
        s.on_packet(&mut ctx, ack);

        assert_eq!(s.new_acks, 0);
        assert_eq!(s.base(), 0);
    }

    #[test]
    fn out_of_range_ack_is_discarded() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 2);

        s.on_packet(&mut ctx, Packet::ack(25));
        assert_eq!(s.new_acks, 0);
        assert_eq!(s.base(), 0);
    }

    #[test]
    fn final_ack_disarms_timer() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 1);

        s.on_packet(&mut ctx, Packet::ack(0));
        assert_eq!(s.base(), s.next_seq());
        assert_eq!(ctx.timers_cancelled, vec![RETRANSMIT_TIMER]);
        // Armed once at submit, never re-armed after the window emptied.
        assert_eq!(ctx.timers_started.len(), 1);
    }

    #[test]
    fn new_ack_restarts_timer_while_packets_remain() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 2);
        ctx.timers_started.clear();

        s.on_packet(&mut ctx, Packet::ack(0));
        assert_eq!(ctx.timers_cancelled, vec![RETRANSMIT_TIMER]);
        assert_eq!(ctx.timers_started, vec![(RETRANSMIT_TIMEOUT_MS, RETRANSMIT_TIMER)]);
    }

    #[test]
    fn timeout_resends_only_unacked_packets() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 6);

        s.on_packet(&mut ctx, Packet::ack(0));
        s.on_packet(&mut ctx, Packet::ack(1));
        s.on_packet(&mut ctx, Packet::ack(3));
        s.on_packet(&mut ctx, Packet::ack(4));
        s.on_packet(&mut ctx, Packet::ack(5));
        ctx.sent.clear();

        s.on_timer(&mut ctx, RETRANSMIT_TIMER);

        let resent: Vec<u32> = ctx.sent.iter().map(|p| p.seq_num).collect();
        assert_eq!(resent, vec![2]);
        assert_eq!(s.packets_resent, 1);
    }

    #[test]
    fn timeout_rearms_timer() {
        let mut s = SrSender::new(6);
        let mut ctx = RecordingContext::new();
        submit_n(&mut s, &mut ctx, 2);
        ctx.timers_started.clear();

        s.on_timer(&mut ctx, RETRANSMIT_TIMER);
        assert_eq!(ctx.timers_started, vec![(RETRANSMIT_TIMEOUT_MS, RETRANSMIT_TIMER)]);
        assert_eq!(s.packets_resent, 2);
    }

    #[test]
    fn sequence_numbers_wrap_around() {
        let mut s = SrSender::with_seq_space(3, 6);
        let mut ctx = RecordingContext::new();

        for lap in 0..2 {
            submit_n(&mut s, &mut ctx, 3);
            for seq in 0..3 {
                s.on_packet(&mut ctx, Packet::ack(lap * 3 + seq));
            }
        }

        assert_eq!(s.base(), 0);
        assert_eq!(s.next_seq(), 0);
        assert_eq!(s.in_flight(), 0);

        submit_n(&mut s, &mut ctx, 1);
        assert_eq!(ctx.sent.last().map(|p| p.seq_num), Some(0));
    }
}
