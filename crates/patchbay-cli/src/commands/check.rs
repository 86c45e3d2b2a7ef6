//! Validate descriptions and verify topology invariants step by step.

use anyhow::Context;
use clap::Args;
use patchbay_config::{validate_script, validate_unit};

use super::common::{load_script, load_unit};

/// Validate a unit and optional script, then verify invariants after every step.
#[derive(Args)]
pub struct CheckArgs {
    /// Unit description name or path to a TOML file
    pub unit: String,

    /// Resize script to replay while checking
    pub script: Option<String>,
}

/// Run the check command.
pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let config = load_unit(&args.unit)?;
    validate_unit(&config)?;
    let script = args.script.as_deref().map(load_script).transpose()?;
    if let Some(script) = &script {
        validate_script(script, &config)?;
    }

    let unit = config.build()?;
    unit.verify().context("invariant broken after build")?;
    println!("build: ok");

    for (index, step) in script.iter().flat_map(|s| s.steps.iter()).enumerate() {
        step.apply(&unit)
            .with_context(|| format!("step {index} ({}) refused", step.op()))?;
        unit.verify()
            .with_context(|| format!("invariant broken after step {index} ({})", step.op()))?;
        println!("step {index} ({}): ok", step.op());
    }

    println!("{}: all invariants hold", config.name);
    Ok(())
}
