//! Helpers shared by several commands.

use anyhow::Context;
use patchbay_config::{ResizeScript, UnitConfig, find_script, find_unit};
use patchbay_core::{ChannelId, RangeId, ResizeReport, Role, Topology};

/// Load a unit description by name or path.
pub fn load_unit(name: &str) -> anyhow::Result<UnitConfig> {
    let path = find_unit(name).ok_or_else(|| anyhow::anyhow!("unit not found: {name}"))?;
    tracing::debug!(path = %path.display(), "resolved unit");
    UnitConfig::load(&path).with_context(|| format!("loading unit {}", path.display()))
}

/// Load a resize script by name or path.
pub fn load_script(name: &str) -> anyhow::Result<ResizeScript> {
    let path = find_script(name).ok_or_else(|| anyhow::anyhow!("script not found: {name}"))?;
    ResizeScript::load(&path).with_context(|| format!("loading script {}", path.display()))
}

/// One-line summary of a resize report.
pub fn format_report(report: &ResizeReport) -> String {
    if report.is_empty() {
        return "no change".to_string();
    }
    format!(
        "+{} / -{} channels, +{} / -{} ranges, {} realiased",
        report.created_channels,
        report.destroyed_channels,
        report.allocated_ranges,
        report.released_ranges,
        report.realiased_channels
    )
}

/// Print the unit header and, if `channels` is set, every channel of both roles.
pub fn print_layout(name: &str, topology: &Topology, channels: bool) {
    let format = topology.format();
    println!("Unit:        {name} ({})", topology.unit());
    println!("Flags:       {}", topology.flags());
    println!(
        "Shape:       {} paths, {} output pads, {} input pads",
        topology.parallel_path_count(),
        topology.pad_count(Role::Output),
        topology.pad_count(Role::Input)
    );
    println!(
        "Format:      {} Hz, {} frames",
        format.samplerate, format.buffer_size
    );
    println!(
        "Channels:    {} output, {} input",
        topology.channel_count(Role::Output),
        topology.channel_count(Role::Input)
    );
    println!("Ranges:      {}", topology.range_count());

    if !channels {
        return;
    }
    for role in Role::ALL {
        if topology.channel_count(role) == 0 {
            continue;
        }
        println!();
        println!("{role}");
        println!("  {:>5} {:>5} {:>5}  buffers", "line", "pad", "path");
        for view in topology.channels(role) {
            println!(
                "  {:>5} {:>5} {:>5}  {}",
                view.line,
                view.pad,
                view.path,
                describe_span(topology, view.id, view.owns_buffers)
            );
        }
    }
}

fn describe_span(topology: &Topology, channel: ChannelId, owns: bool) -> String {
    let Some(span) = topology.span(channel) else {
        return "-".to_string();
    };
    if owns {
        return "owned".to_string();
    }
    let count = topology.span_ranges(span).count();
    let pad_of = |range: RangeId| {
        topology
            .range_owner(range)
            .and_then(|owner| topology.channel(owner))
            .map(|view| format!("{} {}", view.role, view.pad))
            .unwrap_or_else(|| "?".to_string())
    };
    if span.is_single() {
        format!("alias of {}", pad_of(span.first))
    } else {
        format!(
            "alias of {} ranges ({} .. {})",
            count,
            pad_of(span.first),
            pad_of(span.last)
        )
    }
}
