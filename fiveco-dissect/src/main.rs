//! FiveCo Legacy Protocol Dissector
//!
//! Reads a capture script of reassembled deliveries, runs them through one
//! analysis session and prints the decoded frames.

mod report;
mod script;
mod settings;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use fiveco_engine::{CounterScope, Delivery, Dissector};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use report::{Report, Stats};
use script::{parse_script, ScriptDelivery};
use settings::{OutputFormat, Settings};

/// Synthetic counter sharing, as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    /// One counter for the whole session
    Session,
    /// One counter per flow
    PerFlow,
}

impl From<ScopeArg> for CounterScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Session => CounterScope::Session,
            ScopeArg::PerFlow => CounterScope::PerFlow,
        }
    }
}

#[derive(Parser)]
#[command(name = "fiveco-dissect")]
#[command(version, about = "Dissect FiveCo legacy register access traffic")]
struct Cli {
    /// Capture script, one delivery per line
    input: PathBuf,

    /// Settings file (defaults to ~/.config/fiveco-dissect/settings.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Synthetic counter scope
    #[arg(long, value_enum)]
    counter_scope: Option<ScopeArg>,

    /// Maximum characters shown for text registers
    #[arg(long)]
    text_limit: Option<usize>,

    /// Analysis passes over the capture; only the last one is printed
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    passes: u32,

    /// Print summary lines only
    #[arg(short, long)]
    summary_only: bool,

    /// Write the effective settings back to the settings file
    #[arg(long)]
    save_config: bool,
}

/// Run every pass over the capture; only the last pass is reported
fn run_capture<W: Write>(
    dissector: &mut Dissector,
    deliveries: &[ScriptDelivery],
    passes: u32,
    report: &mut Report<W>,
) -> anyhow::Result<Stats> {
    let mut stats = Stats::default();

    for pass in 1..=passes {
        let last = pass == passes;
        debug!("Analysis pass {}", pass);

        for delivery in deliveries {
            if let Some(endpoint) = delivery.endpoint {
                if !dissector.claims_port(endpoint.transport, endpoint.port) {
                    debug!(
                        "Skipping delivery {}: {:?} port {} not registered",
                        delivery.packet, endpoint.transport, endpoint.port
                    );
                    continue;
                }
            }

            match dissector.dissect(&Delivery::new(delivery.flow, delivery.packet, &delivery.data)) {
                Ok(dissection) if last => report.delivery(delivery, dissection)?,
                Err(e) if last => report.rejected(delivery, &e)?,
                _ => {}
            }
        }

        stats.record(&dissector.drain_events());
    }

    Ok(stats)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fiveco_dissect=info,fiveco_protocol=info,fiveco_engine=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(format) = cli.format {
        settings.format = format;
    }
    if let Some(scope) = cli.counter_scope {
        settings.dissector.counter_scope = scope.into();
    }
    if let Some(limit) = cli.text_limit {
        settings.dissector.text_display_limit = limit;
    }
    if cli.summary_only {
        settings.show_trees = false;
    }

    if cli.save_config {
        let path = settings
            .save(cli.config.as_deref())
            .map_err(anyhow::Error::msg)?;
        info!("Saved settings to {}", path.display());
    }

    let text = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let deliveries =
        parse_script(&text).with_context(|| format!("Invalid capture {}", cli.input.display()))?;
    info!("Loaded {} deliveries from {}", deliveries.len(), cli.input.display());

    let mut dissector = Dissector::with_config(settings.dissector.clone())?;
    let stdout = std::io::stdout();
    let mut report = Report::new(stdout.lock(), settings.format, settings.show_trees);
    let stats = run_capture(&mut dissector, &deliveries, cli.passes, &mut report)?;

    report.finish(&stats)?;
    info!(
        "Done: {} frames, {} answers matched, {} without request",
        stats.frames, stats.matched, stats.unmatched
    );

    Ok(())
}
