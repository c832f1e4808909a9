//! CAN Gauge Calibrator CLI Application
//!
//! Front end for the can-gauge-cal library:
//! - Signal lookup in a DBC file for each gauge channel
//! - Calibration tables read from CSV files
//! - Optional TOML config file, overridden by flags

use anyhow::{bail, Context, Result};
use can_gauge_cal::{load_signals, parse_table, Bus, ProtocolConfig};
use clap::Parser;
use std::path::PathBuf;

mod config;

use config::{AppConfig, Channel, DEFAULT_DEVICE};

/// CAN Gauge Calibrator - Program signal encodings and tables into a gauge interface
#[derive(Parser, Debug)]
#[command(name = "can-gauge-cal")]
#[command(about = "Program signal encodings and calibration tables into a CAN gauge interface", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// DBC file describing the vehicle's CAN messages
    #[arg(long, value_name = "FILE")]
    dbc: Option<PathBuf>,

    /// SocketCAN device [default: can0]
    #[arg(long, value_name = "DEV")]
    can: Option<String>,

    /// Tachometer signal name
    #[arg(long, value_name = "NAME")]
    tach_sig: Option<String>,

    /// Speedometer signal name
    #[arg(long, value_name = "NAME")]
    speed_sig: Option<String>,

    /// Analog channel 1 signal name
    #[arg(long, value_name = "NAME")]
    an1_sig: Option<String>,

    /// Analog channel 2 signal name
    #[arg(long, value_name = "NAME")]
    an2_sig: Option<String>,

    /// Analog channel 3 signal name
    #[arg(long, value_name = "NAME")]
    an3_sig: Option<String>,

    /// Analog channel 4 signal name
    #[arg(long, value_name = "NAME")]
    an4_sig: Option<String>,

    /// Tachometer table (CSV of key,value)
    #[arg(long, value_name = "FILE")]
    tach_tbl: Option<PathBuf>,

    /// Speedometer table
    #[arg(long, value_name = "FILE")]
    speed_tbl: Option<PathBuf>,

    /// Analog channel 1 table
    #[arg(long, value_name = "FILE")]
    an1_tbl: Option<PathBuf>,

    /// Analog channel 2 table
    #[arg(long, value_name = "FILE")]
    an2_tbl: Option<PathBuf>,

    /// Analog channel 3 table
    #[arg(long, value_name = "FILE")]
    an3_tbl: Option<PathBuf>,

    /// Analog channel 4 table
    #[arg(long, value_name = "FILE")]
    an4_tbl: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn signal(&self, channel: Channel) -> Option<&String> {
        match channel {
            Channel::Tach => self.tach_sig.as_ref(),
            Channel::Speed => self.speed_sig.as_ref(),
            Channel::An1 => self.an1_sig.as_ref(),
            Channel::An2 => self.an2_sig.as_ref(),
            Channel::An3 => self.an3_sig.as_ref(),
            Channel::An4 => self.an4_sig.as_ref(),
        }
    }

    fn table(&self, channel: Channel) -> Option<&PathBuf> {
        match channel {
            Channel::Tach => self.tach_tbl.as_ref(),
            Channel::Speed => self.speed_tbl.as_ref(),
            Channel::An1 => self.an1_tbl.as_ref(),
            Channel::An2 => self.an2_tbl.as_ref(),
            Channel::An3 => self.an3_tbl.as_ref(),
            Channel::An4 => self.an4_tbl.as_ref(),
        }
    }
}

/// What to program, after merging the config file with the flags
#[derive(Debug)]
struct Plan {
    device: String,
    dbc: PathBuf,
    protocol: ProtocolConfig,
    channels: Vec<ChannelPlan>,
}

#[derive(Debug)]
struct ChannelPlan {
    channel: Channel,
    signal: Option<String>,
    table: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Gauge Calibrator v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using calibration library v{}", can_gauge_cal::VERSION);

    let file_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    let plan = build_plan(&args, file_config)?;
    calibrate(&plan)
}

/// Merge flags over the config file and check the result is usable
fn build_plan(args: &Args, file: AppConfig) -> Result<Plan> {
    let device = args
        .can
        .clone()
        .or(file.device)
        .unwrap_or_else(|| DEFAULT_DEVICE.to_string());

    let mut channels = Vec::new();
    for channel in Channel::ALL {
        let from_file = file.channels.get(channel);
        let signal = args
            .signal(channel)
            .cloned()
            .or_else(|| from_file.and_then(|c| c.signal.clone()));
        let table = args
            .table(channel)
            .cloned()
            .or_else(|| from_file.and_then(|c| c.table.clone()));

        if signal.is_some() && table.is_none() {
            bail!("Missing flag --{}-tbl", channel.name());
        }
        if signal.is_some() || table.is_some() {
            channels.push(ChannelPlan {
                channel,
                signal,
                table,
            });
        }
    }

    let Some(dbc) = args.dbc.clone().or(file.dbc) else {
        bail!("Missing flag --dbc");
    };
    if channels.is_empty() {
        bail!("Nothing to calibrate: give a --<chan>-sig or --<chan>-tbl flag");
    }

    Ok(Plan {
        device,
        dbc,
        protocol: file.protocol,
        channels,
    })
}

/// Send every signal encoding, then every table
fn calibrate(plan: &Plan) -> Result<()> {
    let requested: Vec<(u8, &str)> = plan
        .channels
        .iter()
        .filter_map(|c| c.signal.as_deref().map(|name| (c.channel.index(), name)))
        .collect();

    let signals = if requested.is_empty() {
        Vec::new()
    } else {
        load_signals(&plan.dbc, &requested)
            .with_context(|| format!("Failed to load signals from {:?}", plan.dbc))?
    };

    log::info!("Opening CAN device {}", plan.device);
    let bus = Bus::connect(&plan.device, &plan.protocol)
        .with_context(|| format!("Failed to open CAN device {}", plan.device))?;

    for sig in &signals {
        sig.send_encoding(&bus, &plan.protocol)
            .with_context(|| format!("Failed to send signal {}", sig.name))?;
    }

    let mut tables = 0;
    for entry in &plan.channels {
        let Some(path) = &entry.table else {
            continue;
        };
        log::info!("Loading {} table: {:?}", entry.channel.description(), path);
        let table = parse_table(path, entry.channel.index())?;
        table
            .send(&bus, &plan.protocol)
            .with_context(|| format!("Failed to send {} table", entry.channel.name()))?;
        tables += 1;
    }

    bus.close();
    log::info!(
        "Calibration complete: {} signal(s), {} table(s)",
        signals.len(),
        tables
    );
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
