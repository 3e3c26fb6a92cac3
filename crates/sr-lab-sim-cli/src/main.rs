use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use sr_lab_abstract::{SimConfig, TransportProtocol};
use sr_lab_protocol::{SrReceiver, SrSender};
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective-Repeat ARQ lab simulator")]
struct Args {
    /// Run a scenario from disk instead of the default ad-hoc simulation.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Sender/receiver window size (sequence space is twice this).
    #[arg(long, default_value_t = 6)]
    window_size: u32,

    /// Loss rate for the default simulation.
    #[arg(long, default_value_t = 0.1)]
    loss_rate: f64,

    /// Corruption rate for the default simulation.
    #[arg(long, default_value_t = 0.0)]
    corrupt_rate: f64,

    /// RNG seed for the default simulation.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    info!("sr-lab-sim-cli starting…");

    let sender: Box<dyn TransportProtocol> = Box::new(SrSender::new(args.window_size));
    let receiver: Box<dyn TransportProtocol> = Box::new(SrReceiver::new(args.window_size));

    let report = if let Some(path) = &args.scenario {
        scenario_runner::run_scenario(path, sender, receiver)
            .with_context(|| format!("scenario {} failed", path.display()))?
    } else {
        run_default_sim(&args, sender, receiver)
    };

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn run_default_sim(
    args: &Args,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> SimulationReport {
    let config = SimConfig {
        loss_rate: args.loss_rate,
        corrupt_rate: args.corrupt_rate,
        min_latency: 100,
        max_latency: 500,
        seed: args.seed,
    };
    let mut sim = Simulator::new(config, sender, receiver);
    sim.schedule_app_send(1000, b"Packet 1".to_vec());
    sim.schedule_app_send(2000, b"Packet 2".to_vec());
    sim.schedule_app_send(3000, b"Packet 3".to_vec());

    info!("Starting default headless simulation…");
    sim.run_until_complete();
    info!(
        "Simulation complete: {} payloads delivered, {} packets sent",
        sim.delivered_data.len(),
        sim.sender_packet_count
    );
    sim.export_report()
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
