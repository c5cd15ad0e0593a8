// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stand-alone device runner.
//!
//! Brings one simulated device up, connects it to the Phy, and lets
//! virtual time run until the requested end. Without firmware driving the
//! registers this exercises the timer fabric only; it doubles as the
//! harness embedders copy when wiring a CPU model on top.

use clap::Parser;
use nwsim::config::{DeviceConfig, FabricKind};
use nwsim::phy::{NosimLink, P2G4FifoLink, PhyLink};
use nwsim::Simulator;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "nwsim-run", version, about)]
struct Args {
    /// Rendezvous directory holding the Phy FIFOs.
    #[arg(long, default_value = "/tmp/nwsim")]
    com_dir: PathBuf,

    /// Device number within the simulation.
    #[arg(short = 'd', long, default_value_t = 0)]
    device: u32,

    /// Offset in time (at simulation start) of this device; at device
    /// time 0 the Phy is at <START_OFFSET> microseconds.
    #[arg(long, default_value_t = 0.0)]
    start_offset: f64,

    /// Linear crystal drift coefficient (e.g. -30e-6 for -30 ppm).
    #[arg(long, default_value_t = 0.0)]
    xo_drift: f64,

    /// Use real AES for the link-layer crypto instead of the pass-through
    /// keystream.
    #[arg(long = "RealEncryption", alias = "real-encryption")]
    real_encryption: bool,

    /// Do not connect to a Phy; any radio activity becomes fatal.
    #[arg(long)]
    nosim: bool,

    /// Use the DPPI routing fabric instead of PPI.
    #[arg(long)]
    dppi: bool,

    /// Virtual time to run until, microseconds.
    #[arg(long, default_value_t = 1_000_000)]
    sim_length: u64,
}

fn run(args: &Args) -> nwsim::Result<()> {
    let mut cfg = DeviceConfig::default();
    cfg.args.start_offset = args.start_offset;
    cfg.args.xo_drift = args.xo_drift;
    cfg.args.real_encryption = args.real_encryption;
    cfg.args.nosim = args.nosim;
    cfg.fabric = if args.dppi {
        FabricKind::Dppi
    } else {
        FabricKind::Ppi
    };

    let phy: Box<dyn PhyLink> = if args.nosim {
        Box::new(NosimLink::new())
    } else {
        Box::new(P2G4FifoLink::connect(&args.com_dir, args.device)?)
    };

    let mut sim = Simulator::new(cfg, phy);
    log::info!(
        "device {} up, running to {}us (drift {}, offset {}us)",
        args.device,
        args.sim_length,
        args.xo_drift,
        args.start_offset
    );
    let result = sim.run_until(args.sim_length);
    sim.shutdown();
    result
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("simulation ended with an error: {e}");
            ExitCode::FAILURE
        }
    }
}
