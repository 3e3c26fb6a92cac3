//! In-memory [`SystemContext`] for exercising protocol state machines
//! without the discrete-event engine: every action a handler takes is
//! recorded for inspection.

use sr_lab_abstract::{Packet, SystemContext};

#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub delivered: Vec<Vec<u8>>,
    pub timers_started: Vec<(u64, u32)>,
    pub timers_cancelled: Vec<u32>,
    pub logs: Vec<String>,
    pub metrics: Vec<(String, f64)>,
    pub now: u64,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and return the packets sent so far.
    pub fn take_sent(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.sent)
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, delay_ms: u64, timer_id: u32) {
        self.timers_started.push((delay_ms, timer_id));
    }

    fn cancel_timer(&mut self, timer_id: u32) {
        self.timers_cancelled.push(timer_id);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.delivered.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.metrics.push((name.to_string(), value));
    }
}
