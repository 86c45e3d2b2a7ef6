//! Unit descriptions and resize scripts for patchbay audio units.
//!
//! This crate describes an [`AudioUnit`](patchbay_core::AudioUnit) in TOML,
//! builds units from those descriptions, and replays scripted resize sequences
//! against them.
//!
//! # Features
//!
//! - **Unit descriptions**: width, pad counts, flags, format, and limits in one file
//! - **Resize scripts**: ordered `[[steps]]` tagged by `op`
//! - **Validation**: every problem in a file reported at once
//! - **Paths**: platform-specific unit and script directories
//!
//! # Example
//!
//! ```rust
//! use patchbay_config::{ResizeScript, ResizeStep, UnitConfig};
//! use patchbay_core::{Role, TopologyFlags};
//!
//! let config = UnitConfig::new("submix")
//!     .with_shape(2, 1, 4)
//!     .with_flags(TopologyFlags::fan_in());
//! let unit = config.build().unwrap();
//!
//! let script = ResizeScript::new().with_step(ResizeStep::Pads {
//!     role: Role::Input,
//!     count: 6,
//! });
//! let reports = script.run(&unit).unwrap();
//! assert_eq!(reports[0].realiased_channels, 2);
//! ```

mod error;
mod script;
mod unit_config;

/// Platform-specific paths for unit descriptions and scripts.
pub mod paths;

/// Unit and script validation.
pub mod validation;

pub use error::ConfigError;
pub use paths::{
    ensure_user_units_dir, find_script, find_unit, list_all_units, list_system_units,
    list_user_units, system_units_dir, unit_name_from_path, user_config_dir, user_scripts_dir,
    user_units_dir,
};
pub use script::{ResizeScript, ResizeStep};
pub use unit_config::UnitConfig;
pub use validation::{
    ValidationError, ValidationResult, validate_script, validate_step, validate_unit,
};
