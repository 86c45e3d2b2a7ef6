//! Platform-specific paths for unit descriptions and resize scripts.
//!
//! # Directory Structure
//!
//! - **User units**: `~/.config/patchbay/units/` (Linux), `~/Library/Application Support/patchbay/units/` (macOS), `%APPDATA%\patchbay\units\` (Windows)
//! - **User scripts**: `~/.config/patchbay/scripts/` and platform equivalents
//! - **System units**: `/usr/share/patchbay/units/` (Linux), `/Library/Application Support/patchbay/units/` (macOS)
//!
//! # Example
//!
//! ```rust,no_run
//! use patchbay_config::paths;
//!
//! // Find a unit description by name (searches user then system directories)
//! if let Some(path) = paths::find_unit("submix") {
//!     println!("Found unit at: {:?}", path);
//! }
//! ```

use std::path::{Path, PathBuf};

/// Application name used for directory paths.
const APP_NAME: &str = "patchbay";

/// Subdirectory name for unit descriptions.
const UNITS_SUBDIR: &str = "units";

/// Subdirectory name for resize scripts.
const SCRIPTS_SUBDIR: &str = "scripts";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the user-specific unit description directory.
pub fn user_units_dir() -> PathBuf {
    user_config_dir().join(UNITS_SUBDIR)
}

/// Returns the user-specific resize script directory.
pub fn user_scripts_dir() -> PathBuf {
    user_config_dir().join(SCRIPTS_SUBDIR)
}

/// Returns the system-wide unit description directory.
///
/// # Platform Paths
///
/// - Linux: `/usr/share/patchbay/units/`
/// - macOS: `/Library/Application Support/patchbay/units/`
/// - Other: the platform data directory
pub fn system_units_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/share").join(APP_NAME).join(UNITS_SUBDIR)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support")
            .join(APP_NAME)
            .join(UNITS_SUBDIR)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(UNITS_SUBDIR)
    }
}

/// Find a unit description by name or path.
///
/// Searches in the following order:
/// 1. `name` as a path, if it is a file
/// 2. User units directory
/// 3. System units directory
///
/// A `.toml` extension is added to bare names.
pub fn find_unit(name: &str) -> Option<PathBuf> {
    find_in(name, &[user_units_dir(), system_units_dir()])
}

/// Find a resize script by name or path, searching the user scripts directory.
pub fn find_script(name: &str) -> Option<PathBuf> {
    find_in(name, &[user_scripts_dir()])
}

fn find_in(name: &str, search: &[PathBuf]) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };
    search
        .iter()
        .map(|dir| dir.join(&filename))
        .find(|candidate| candidate.is_file())
}

/// Ensure the user units directory exists.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_user_units_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_units_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }

    Ok(dir)
}

/// List all unit descriptions in the user units directory.
pub fn list_user_units() -> Vec<PathBuf> {
    list_toml_in_dir(&user_units_dir())
}

/// List all unit descriptions in the system units directory.
pub fn list_system_units() -> Vec<PathBuf> {
    list_toml_in_dir(&system_units_dir())
}

/// List all available unit descriptions, user directory first.
pub fn list_all_units() -> Vec<PathBuf> {
    let mut units = list_user_units();
    units.extend(list_system_units());
    units
}

/// TOML files directly inside `dir`, sorted. Empty if `dir` cannot be read.
fn list_toml_in_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    files
}

/// Get the unit name from a file path (the file stem).
///
/// # Example
///
/// ```rust
/// use patchbay_config::paths::unit_name_from_path;
/// use std::path::Path;
///
/// let name = unit_name_from_path(Path::new("/path/to/submix.toml"));
/// assert_eq!(name, Some("submix".to_string()));
/// ```
pub fn unit_name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(ToString::to_string)
}
