//! Loads a TOML [`TestScenario`], drives a simulation from its actions and
//! evaluates its assertions against the finished run.

use std::fs;
use std::path::Path;

use sr_lab_abstract::{SimConfig, TestAction, TestAssertion, TestScenario, TransportProtocol};
use thiserror::Error;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse scenario file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("scenario '{scenario}' assertion failed: {detail}")]
    AssertionFailed { scenario: String, detail: String },
}

pub fn load_scenario(path: &Path) -> Result<TestScenario, ScenarioError> {
    let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Run `path` to completion with the given protocol pair and check every
/// assertion. Returns the report of the finished run.
pub fn run_scenario(
    path: &Path,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<SimulationReport, ScenarioError> {
    let scenario = load_scenario(path)?;

    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);

    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions);

    info!(
        "running scenario '{}': {}",
        scenario.name, scenario.description
    );
    sim.run_until_complete();

    let report = sim.export_report();
    check_assertions(&scenario, &report)?;
    info!("scenario '{}' passed", scenario.name);
    Ok(report)
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                sim.schedule_app_send(*time, data.as_bytes().to_vec());
            }
            TestAction::DropNextFromSenderSeq { seq } => {
                sim.add_drop_sender_seq_once(*seq);
            }
            TestAction::DropNextFromReceiverAck { ack } => {
                sim.add_drop_receiver_ack_once(*ack);
            }
        }
    }
}

pub fn check_assertions(
    scenario: &TestScenario,
    report: &SimulationReport,
) -> Result<(), ScenarioError> {
    let fail = |detail: String| ScenarioError::AssertionFailed {
        scenario: scenario.name.clone(),
        detail,
    };

    for assertion in &scenario.assertions {
        match assertion {
            TestAssertion::DataDelivered { data } => {
                let found = report
                    .delivered_data
                    .iter()
                    .any(|payload| strip_padding(payload) == data.as_bytes());
                if !found {
                    return Err(fail(format!("data {data:?} was never delivered")));
                }
            }
            TestAssertion::SenderPacketCount { min, max } => {
                let count = report.sender_packet_count;
                if count < *min {
                    return Err(fail(format!("sender sent {count} packets, expected >= {min}")));
                }
                if let Some(max) = max
                    && count > *max
                {
                    return Err(fail(format!("sender sent {count} packets, expected <= {max}")));
                }
            }
            TestAssertion::MaxDuration { ms } => {
                if report.duration_ms > *ms {
                    return Err(fail(format!(
                        "simulation took {}ms, expected <= {ms}ms",
                        report.duration_ms
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Delivered payloads are fixed-size records; scenario strings are compared
/// against the payload with its zero padding stripped.
fn strip_padding(payload: &[u8]) -> &[u8] {
    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    &payload[..end]
}
