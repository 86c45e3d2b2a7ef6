//! Replay a resize script against a unit.

use std::path::PathBuf;

use clap::Args;
use patchbay_config::UnitConfig;
use patchbay_core::ResizeReport;
use serde::Serialize;

use super::common::{format_report, load_script, load_unit, print_layout};

/// Replay a resize script and report the work each step performed.
#[derive(Args)]
pub struct RunArgs {
    /// Unit description name or path to a TOML file
    pub unit: String,

    /// Resize script name or path to a TOML file
    pub script: String,

    /// Print per-step reports as JSON
    #[arg(long)]
    pub json: bool,

    /// Save the resulting unit description to this path
    #[arg(short, long)]
    pub save: Option<PathBuf>,
}

#[derive(Serialize)]
struct StepRecord {
    index: usize,
    op: &'static str,
    report: ResizeReport,
}

/// Run the run command.
pub fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_unit(&args.unit)?;
    let script = load_script(&args.script)?;
    let unit = config.build()?;

    let mut records = Vec::with_capacity(script.len());
    script.run_with(&unit, |index, step, report| {
        records.push(StepRecord {
            index,
            op: step.op(),
            report: *report,
        });
        Ok(())
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            println!(
                "{:>3}  {:<15} {}",
                record.index,
                record.op,
                format_report(&record.report)
            );
        }
        println!();
        unit.read(|topology| print_layout(&config.name, topology, false));
    }

    if let Some(path) = args.save {
        let mut result = UnitConfig::from_snapshot(config.name.clone(), &unit.topology_snapshot());
        result.description.clone_from(&config.description);
        result.save(&path)?;
        tracing::info!(path = %path.display(), "saved resulting unit");
    }
    Ok(())
}
