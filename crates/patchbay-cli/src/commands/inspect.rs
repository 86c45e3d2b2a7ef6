//! Display the layout of a unit description.

use clap::Args;

use super::common::{load_unit, print_layout};

/// Build a unit from its description and show its layout.
#[derive(Args)]
pub struct InspectArgs {
    /// Unit description name or path to a TOML file
    pub unit: String,

    /// List every channel and its buffer span
    #[arg(short, long)]
    pub channels: bool,

    /// Print the topology snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the inspect command.
pub fn run(args: InspectArgs) -> anyhow::Result<()> {
    let config = load_unit(&args.unit)?;
    let unit = config.build()?;

    if args.json {
        let json = serde_json::json!({
            "name": config.name,
            "description": config.description,
            "topology": unit.topology_snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    unit.read(|topology| print_layout(&config.name, topology, args.channels));
    Ok(())
}
