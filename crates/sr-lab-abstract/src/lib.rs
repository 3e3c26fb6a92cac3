pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{PAYLOAD_LEN, Packet, UNUSED};

pub use config::SimConfig;
pub use scenario::{SimConfigOverride, TestAction, TestAssertion, TestScenario};
