//! Unit description file format.

use std::path::Path;

use patchbay_core::{
    AggregateMode, AudioUnit, BufferFormat, Ownership, Role, TopologyFlags, TopologyLimits,
    TopologySnapshot,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::validation::validate_unit;

/// Description of one audio unit's channel matrices.
///
/// Unit descriptions are stored as TOML files. Every field except `name` is
/// optional; omitted counts are zero and omitted flags are sync, input-owned.
///
/// # TOML Format
///
/// ```toml
/// name = "submix"
/// description = "Four stereo inputs summed into one bus"
/// parallel_paths = 2
/// output_pads = 1
/// input_pads = 4
/// aggregate = "async"
/// ownership = "input"
///
/// [format]
/// samplerate = 48000
/// buffer_size = 256
///
/// [limits]
/// max_parallel_paths = 8
/// max_pads = 64
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitConfig {
    /// Name of the unit.
    pub name: String,

    /// Optional description of the unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Parallel paths per pad (e.g. 2 for stereo).
    #[serde(default)]
    pub parallel_paths: usize,

    /// Output pad count.
    #[serde(default)]
    pub output_pads: usize,

    /// Input pad count.
    #[serde(default)]
    pub input_pads: usize,

    /// How aliasing channels map onto owned ranges.
    #[serde(default)]
    pub aggregate: AggregateMode,

    /// Which role owns buffer ranges.
    #[serde(default)]
    pub ownership: Ownership,

    /// Buffer format stamped on every range.
    #[serde(default)]
    pub format: BufferFormat,

    /// Resize limits.
    #[serde(default)]
    pub limits: TopologyLimits,
}

impl UnitConfig {
    /// Create an empty unit description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parallel_paths: 0,
            output_pads: 0,
            input_pads: 0,
            aggregate: AggregateMode::default(),
            ownership: Ownership::default(),
            format: BufferFormat::default(),
            limits: TopologyLimits::default(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set width and both pad counts.
    pub fn with_shape(
        mut self,
        parallel_paths: usize,
        output_pads: usize,
        input_pads: usize,
    ) -> Self {
        self.parallel_paths = parallel_paths;
        self.output_pads = output_pads;
        self.input_pads = input_pads;
        self
    }

    /// Set aggregation mode and ownership from validated flags.
    pub fn with_flags(mut self, flags: TopologyFlags) -> Self {
        self.aggregate = flags.mode();
        self.ownership = flags.ownership();
        self
    }

    /// Set the buffer format.
    pub fn with_format(mut self, format: BufferFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the resize limits.
    pub fn with_limits(mut self, limits: TopologyLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Describe an existing unit layout.
    pub fn from_snapshot(name: impl Into<String>, snapshot: &TopologySnapshot) -> Self {
        Self {
            name: name.into(),
            description: None,
            parallel_paths: snapshot.parallel_paths,
            output_pads: snapshot.output_pads,
            input_pads: snapshot.input_pads,
            aggregate: snapshot.aggregate,
            ownership: snapshot.ownership,
            format: snapshot.format,
            limits: snapshot.limits,
        }
    }

    /// Pad count of `role`.
    pub fn pads(&self, role: Role) -> usize {
        match role {
            Role::Output => self.output_pads,
            Role::Input => self.input_pads,
        }
    }

    /// Combined aggregation mode and ownership.
    pub fn flags(&self) -> Result<TopologyFlags, ConfigError> {
        Ok(TopologyFlags::new(self.aggregate, self.ownership)?)
    }

    /// Validate the description and allocate the unit.
    pub fn build(&self) -> Result<AudioUnit, ConfigError> {
        validate_unit(self)?;
        let unit = AudioUnit::builder()
            .parallel_paths(self.parallel_paths)
            .output_pads(self.output_pads)
            .input_pads(self.input_pads)
            .flags(self.flags()?)
            .format(self.format)
            .limits(self.limits)
            .build()?;
        tracing::debug!(name = %self.name, unit = %unit.id(), "built unit");
        Ok(unit)
    }

    /// Load a unit description from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let config: UnitConfig = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), name = %config.name, "loaded unit description");
        Ok(config)
    }

    /// Load a unit description from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the unit description to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        tracing::debug!(path = %path.display(), name = %self.name, "saved unit description");
        Ok(())
    }

    /// Convert the unit description to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = UnitConfig::from_toml(r#"name = "bare""#).unwrap();
        assert_eq!(config, UnitConfig::new("bare"));
        assert_eq!(config.flags().unwrap(), TopologyFlags::sync());
    }

    #[test]
    fn full_toml_parses() {
        let toml = r#"
            name = "submix"
            parallel_paths = 2
            output_pads = 1
            input_pads = 4
            aggregate = "async"
            ownership = "input"

            [format]
            samplerate = 48000
            buffer_size = 256

            [limits]
            max_parallel_paths = 8
            max_pads = 64
        "#;
        let config = UnitConfig::from_toml(toml).unwrap();
        assert_eq!(config.flags().unwrap(), TopologyFlags::fan_in());
        assert_eq!(config.pads(Role::Input), 4);
        assert_eq!(config.format.buffer_size, 256);
        assert_eq!(config.limits.max_pads, 64);
    }

    #[test]
    fn unknown_enum_value_is_a_parse_error() {
        let err = UnitConfig::from_toml("name = \"x\"\naggregate = \"sideways\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn build_validates_first() {
        let config = UnitConfig::new("bad").with_format(BufferFormat {
            samplerate: 0,
            buffer_size: 64,
        });
        assert!(matches!(config.build(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn build_allocates_described_shape() {
        let config = UnitConfig::new("stereo")
            .with_shape(2, 1, 4)
            .with_flags(TopologyFlags::fan_in());
        let unit = config.build().unwrap();
        assert_eq!(unit.parallel_path_count(), 2);
        assert_eq!(unit.pad_count(Role::Input), 4);
        assert_eq!(unit.flags(), TopologyFlags::fan_in());
    }

    #[test]
    fn snapshot_round_trip() {
        let config = UnitConfig::new("mirror")
            .with_shape(3, 2, 2)
            .with_flags(TopologyFlags::independent());
        let unit = config.build().unwrap();
        let described = UnitConfig::from_snapshot("mirror", &unit.topology_snapshot());
        assert_eq!(described, config);
    }

    #[test]
    fn toml_string_round_trip() {
        let config = UnitConfig::new("rt")
            .with_description("round trip")
            .with_shape(2, 1, 1);
        let parsed = UnitConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
