use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_FILE: &str = "QUILTVIEW_CONFIG";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const QUALIFIER: &str = "";
const ORGANISATION: &str = "";
const APPLICATION: &str = "quiltview";

/// Where the active configuration comes from, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` on the command line. Must exist.
    Explicit(PathBuf),
    /// `$QUILTVIEW_CONFIG`. Must exist.
    Environment(PathBuf),
    /// `<config_dir>/quiltview/config.toml`, used only when present.
    User(PathBuf),
    /// No file; the built-in control table applies.
    BuiltIn,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(path)
            | ConfigSource::Environment(path)
            | ConfigSource::User(path) => Some(path),
            ConfigSource::BuiltIn => None,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::Explicit(path) => write!(f, "{} (--config)", path.display()),
            ConfigSource::Environment(path) => {
                write!(f, "{} (${ENV_CONFIG_FILE})", path.display())
            }
            ConfigSource::User(path) => write!(f, "{} (user config)", path.display()),
            ConfigSource::BuiltIn => f.write_str("built-in defaults"),
        }
    }
}

/// Default location of the user config file, whether or not it exists.
pub fn user_config_file() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .ok_or_else(|| anyhow!("failed to determine user directories"))?;
    Ok(project_dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn discover_config(explicit: Option<&Path>) -> Result<ConfigSource> {
    if let Some(path) = explicit {
        return Ok(ConfigSource::Explicit(path.to_path_buf()));
    }
    if let Some(path) = env_override(ENV_CONFIG_FILE) {
        return Ok(ConfigSource::Environment(path));
    }
    let user = user_config_file()?;
    if user.is_file() {
        Ok(ConfigSource::User(user))
    } else {
        Ok(ConfigSource::BuiltIn)
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
