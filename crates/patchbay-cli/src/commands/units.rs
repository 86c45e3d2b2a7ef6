//! List installed unit descriptions.

use clap::Args;
use patchbay_config::{
    UnitConfig, list_system_units, list_user_units, unit_name_from_path, user_units_dir,
};

/// List unit descriptions found in the user and system directories.
#[derive(Args)]
pub struct UnitsArgs {
    /// Only list the user directory
    #[arg(long)]
    pub user: bool,
}

/// Run the units command.
pub fn run(args: UnitsArgs) -> anyhow::Result<()> {
    let mut paths = list_user_units();
    if !args.user {
        paths.extend(list_system_units());
    }

    if paths.is_empty() {
        println!("No unit descriptions found in {}", user_units_dir().display());
        return Ok(());
    }

    for path in paths {
        let name = unit_name_from_path(&path).unwrap_or_default();
        match UnitConfig::load(&path) {
            Ok(config) => println!(
                "{name:<20} {} paths, {} out / {} in pads, {}/{}-owned",
                config.parallel_paths,
                config.output_pads,
                config.input_pads,
                config.aggregate,
                config.ownership
            ),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable unit");
                println!("{name:<20} (unreadable)");
            }
        }
    }
    Ok(())
}
