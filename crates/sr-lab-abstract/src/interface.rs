use crate::packet::Packet;

/// The capability provided by the simulator to a protocol entity.
/// Entities call these methods to interact with the channel, the timer
/// facility and the application layer.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel for delivery to the peer.
    fn send_packet(&mut self, packet: Packet);

    /// Start a single-shot timer.
    /// `timer_id` identifies the timer; firing invokes the entity's
    /// `on_timer` exactly once per arm unless the timer is cancelled first.
    fn start_timer(&mut self, delay_ms: u64, timer_id: u32);

    /// Cancel a running timer.
    fn cancel_timer(&mut self, timer_id: u32);

    /// Deliver a contiguous, in-order payload to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Current simulation time in ms.
    fn now(&self) -> u64;

    /// Record a numeric metric for visualization / grading (e.g. counter
    /// values at their increment points). Aggregated by the engine for
    /// later inspection; behaviorally inert.
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so bare harnesses don't need to care.
    }
}

/// The event-handler surface of one protocol entity. Every handler runs
/// to completion before the next event is processed; all waiting is state
/// retained between invocations.
pub trait TransportProtocol {
    /// Called once when the simulation starts, before any other handler.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when an armed timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext, timer_id: u32);

    /// Called when the application layer submits an outbound message.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, data: &[u8]);
}
