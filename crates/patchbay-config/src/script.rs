//! Resize scripts: ordered topology mutations replayed against a unit.
//!
//! A script is a TOML file with one `[[steps]]` table per mutation, tagged by
//! `op`:
//!
//! ```toml
//! name = "grow submix"
//!
//! [[steps]]
//! op = "pads"
//! role = "input"
//! count = 6
//!
//! [[steps]]
//! op = "parallel_paths"
//! count = 4
//!
//! [[steps]]
//! op = "flags"
//! aggregate = "sync"
//! ownership = "both"
//!
//! [[steps]]
//! op = "format"
//! samplerate = 96000
//! buffer_size = 128
//! ```

use std::path::Path;

use patchbay_core::{
    AggregateMode, AudioUnit, BufferFormat, Ownership, ResizeReport, Role, TopologyError,
    TopologyFlags,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One topology mutation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ResizeStep {
    /// Set the parallel path count of both roles.
    ParallelPaths {
        /// New width.
        count: usize,
    },
    /// Set the pad count of one role.
    Pads {
        /// Role to resize.
        role: Role,
        /// New depth.
        count: usize,
    },
    /// Switch aggregation mode and ownership.
    Flags {
        /// New aggregation mode.
        aggregate: AggregateMode,
        /// New ownership.
        ownership: Ownership,
    },
    /// Stamp a new buffer format on every range.
    Format {
        /// Samples per second.
        samplerate: u32,
        /// Frames per render tick.
        buffer_size: u32,
    },
}

impl ResizeStep {
    /// Operation name as written in the `op` key.
    pub fn op(&self) -> &'static str {
        match self {
            ResizeStep::ParallelPaths { .. } => "parallel_paths",
            ResizeStep::Pads { .. } => "pads",
            ResizeStep::Flags { .. } => "flags",
            ResizeStep::Format { .. } => "format",
        }
    }

    /// Applies the step to `unit`.
    ///
    /// Returns the work performed; format changes perform no structural work
    /// and report an empty [`ResizeReport`].
    pub fn apply(&self, unit: &AudioUnit) -> Result<ResizeReport, TopologyError> {
        match *self {
            ResizeStep::ParallelPaths { count } => unit.set_parallel_path_count(count),
            ResizeStep::Pads { role, count } => unit.set_pad_count(role, count),
            ResizeStep::Flags {
                aggregate,
                ownership,
            } => unit.set_flags(TopologyFlags::new(aggregate, ownership)?),
            ResizeStep::Format {
                samplerate,
                buffer_size,
            } => unit
                .set_format(BufferFormat {
                    samplerate,
                    buffer_size,
                })
                .map(|()| ResizeReport::default()),
        }
    }
}

/// Ordered list of [`ResizeStep`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResizeScript {
    /// Optional script name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Steps in replay order.
    #[serde(default)]
    pub steps: Vec<ResizeStep>,
}

impl ResizeScript {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn with_step(mut self, step: ResizeStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True if the script has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Replays every step against `unit`, stopping at the first failure.
    ///
    /// Returns one report per step. A failed step leaves the unit in the state
    /// left by the previous step.
    pub fn run(&self, unit: &AudioUnit) -> Result<Vec<ResizeReport>, ConfigError> {
        self.run_with(unit, |_, _, _| Ok(()))
    }

    /// Like [`run`](Self::run), calling `after_step` with the step index, the
    /// step, and its report once each step has been applied.
    pub fn run_with<F>(
        &self,
        unit: &AudioUnit,
        mut after_step: F,
    ) -> Result<Vec<ResizeReport>, ConfigError>
    where
        F: FnMut(usize, &ResizeStep, &ResizeReport) -> Result<(), ConfigError>,
    {
        let mut reports = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let report = step.apply(unit).map_err(|source| ConfigError::Step {
                index,
                op: step.op(),
                source,
            })?;
            tracing::info!(index, op = step.op(), ?report, "applied resize step");
            after_step(index, step, &report)?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Load a script from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let script: ResizeScript = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), steps = script.len(), "loaded resize script");
        Ok(script)
    }

    /// Load a script from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the script to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Convert the script to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
        name = "grow submix"

        [[steps]]
        op = "pads"
        role = "input"
        count = 6

        [[steps]]
        op = "parallel_paths"
        count = 4

        [[steps]]
        op = "flags"
        aggregate = "sync"
        ownership = "both"

        [[steps]]
        op = "format"
        samplerate = 96000
        buffer_size = 128
    "#;

    fn fan_in() -> AudioUnit {
        AudioUnit::builder()
            .parallel_paths(2)
            .output_pads(1)
            .input_pads(4)
            .flags(TopologyFlags::fan_in())
            .build()
            .unwrap()
    }

    #[test]
    fn parses_tagged_steps() {
        let script = ResizeScript::from_toml(SCRIPT).unwrap();
        assert_eq!(script.name.as_deref(), Some("grow submix"));
        assert_eq!(
            script.steps,
            vec![
                ResizeStep::Pads {
                    role: Role::Input,
                    count: 6
                },
                ResizeStep::ParallelPaths { count: 4 },
                ResizeStep::Flags {
                    aggregate: AggregateMode::Sync,
                    ownership: Ownership::Both
                },
                ResizeStep::Format {
                    samplerate: 96_000,
                    buffer_size: 128
                },
            ]
        );
    }

    #[test]
    fn unknown_op_is_rejected() {
        let err = ResizeScript::from_toml("[[steps]]\nop = \"rotate\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn run_reports_every_step() {
        let unit = fan_in();
        let script = ResizeScript::from_toml(SCRIPT).unwrap();
        let reports = script.run(&unit).unwrap();

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].created_channels, 4);
        assert_eq!(reports[0].realiased_channels, 2);
        assert!(reports[3].is_empty());
        assert_eq!(unit.pad_count(Role::Input), 6);
        assert_eq!(unit.parallel_path_count(), 4);
        assert_eq!(unit.flags(), TopologyFlags::independent());
        assert_eq!(unit.format().samplerate, 96_000);
    }

    #[test]
    fn failing_step_reports_index() {
        let unit = fan_in();
        let script = ResizeScript::new()
            .with_step(ResizeStep::ParallelPaths { count: 1 })
            .with_step(ResizeStep::Flags {
                aggregate: AggregateMode::Async,
                ownership: Ownership::Both,
            });
        let err = script.run(&unit).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Step {
                index: 1,
                op: "flags",
                source: TopologyError::InvalidFlags { .. }
            }
        ));
        assert_eq!(unit.parallel_path_count(), 1);
    }

    #[test]
    fn run_with_sees_each_step() {
        let unit = fan_in();
        let script = ResizeScript::new()
            .with_step(ResizeStep::ParallelPaths { count: 3 })
            .with_step(ResizeStep::ParallelPaths { count: 3 });
        let mut seen = Vec::new();
        script
            .run_with(&unit, |index, step, report| {
                seen.push((index, step.op(), report.is_empty()));
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![(0, "parallel_paths", false), (1, "parallel_paths", true)]);
    }

    #[test]
    fn toml_round_trip() {
        let script = ResizeScript::from_toml(SCRIPT).unwrap();
        let again = ResizeScript::from_toml(&script.to_toml().unwrap()).unwrap();
        assert_eq!(again, script);
    }
}
