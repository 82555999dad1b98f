//! Configuration loading and validation.
//!
//! Settings are layered, later layers winning:
//! 1. built-in defaults,
//! 2. `tarship.toml` in the platform config directory (or the file named by
//!    `TARSHIP_CONFIG`),
//! 3. `TARSHIP_*` environment variables,
//! 4. `DASHBOARD_USER` and `DASHBOARD_TOKEN`.
//!
//! Command line arguments are validated on top of the merged settings, so a
//! bad destination or dashboard URL is rejected before any work starts.

pub mod error;
mod settings;
mod target;

pub use crate::settings::Settings;
pub use crate::target::DashboardTarget;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use std::path::{Component, Path, PathBuf};
use tarship_storage::ObjectLocation;

pub const DEFAULT_TITLE: &str = "Deployment from CI";
const CONFIG_FILE: &str = "tarship.toml";
const CONFIG_PATH_VAR: &str = "TARSHIP_CONFIG";
const USER_VAR: &str = "DASHBOARD_USER";
const TOKEN_VAR: &str = "DASHBOARD_TOKEN";

/// Command line input, before validation.
#[derive(Clone, Debug)]
pub struct Arguments {
    pub source: PathBuf,
    pub destination: String,
    pub dashboard_url: String,
    pub title: String,
}

/// Dashboard account used for HTTP basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("user", &self.user).field("token", &"<redacted>").finish()
    }
}

/// Everything a run needs, validated.
#[derive(Clone, Debug)]
pub struct Config {
    /// Absolute, lexically normalized source directory.
    pub source: PathBuf,
    /// Name of the single top-level folder inside the archive.
    pub archive_root: String,
    pub destination: ObjectLocation,
    pub dashboard: DashboardTarget,
    pub credentials: Credentials,
    pub title: String,
    pub settings: Settings,
}

impl Config {
    /// Validate `arguments` against the settings layered from the default
    /// providers.
    pub fn load(arguments: Arguments) -> Result<Self> {
        Self::from_figment(arguments, Self::figment())
    }

    /// The default provider stack; see the crate documentation.
    pub fn figment() -> Figment {
        let file = std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .or_else(|| ProjectDirs::from("", "", "tarship").map(|dirs| dirs.config_dir().join(CONFIG_FILE)));
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(file) = file {
            tracing::trace!(file = %file.display(), "Config file");
            figment = figment.merge(Toml::file(file));
        }
        figment
            .merge(Env::prefixed("TARSHIP_").ignore(&["config"]))
            .merge(Env::raw().only(&[USER_VAR, TOKEN_VAR]))
    }

    pub fn from_figment(arguments: Arguments, figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().or_raise(|| ErrorKind::Load)?;
        let (source, archive_root) = source_directory(&arguments.source)?;
        let destination: ObjectLocation = arguments
            .destination
            .parse::<ObjectLocation>()
            .or_raise(|| ErrorKind::InvalidObjectUri(arguments.destination.clone()))?;
        let dashboard: DashboardTarget = arguments.dashboard_url.parse()?;
        let credentials = Credentials {
            user: required(settings.dashboard_user.as_deref(), USER_VAR)?,
            token: required(settings.dashboard_token.as_deref(), TOKEN_VAR)?,
        };
        Ok(Self {
            source,
            archive_root,
            destination,
            dashboard,
            credentials,
            title: arguments.title,
            settings,
        })
    }
}

fn required(value: Option<&str>, variable: &'static str) -> Result<String> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => exn::bail!(ErrorKind::MissingCredentials(variable)),
    }
}

/// Resolve the source directory to an absolute path without touching the
/// filesystem, and pick the archive root from its final component.
fn source_directory(path: &Path) -> Result<(PathBuf, String)> {
    let absolute = std::path::absolute(path).or_raise(|| ErrorKind::InvalidSource(path.to_path_buf()))?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                normalized.pop();
            },
            other => normalized.push(other),
        }
    }
    let archive_root = normalized
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidSource(path.to_path_buf())))?;
    Ok((normalized, archive_root))
}
