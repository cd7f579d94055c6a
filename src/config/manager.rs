//! Configuration file wrangling

use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use figment::{
    providers::{Env, Format as _, Toml},
    Figment, Provider,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::Configuration;
use crate::cli::styles::{HEADER, RESET};

/// Environment variables with this prefix set configuration fields, e.g. `FTCLIENT_TIMEOUT=5`
pub const ENV_PREFIX: &str = "FTCLIENT_";

const BASE_CONFIG_FILENAME: &str = "ftclient.toml";

/// `/etc/ftclient.toml` on Unix; nothing elsewhere
fn system_config_path() -> Option<PathBuf> {
    if cfg!(unix) {
        Some(Path::new("/etc").join(BASE_CONFIG_FILENAME))
    } else {
        None
    }
}

/// `<config dir>/ftclient/ftclient.toml`; the config dir is platform dependent
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ftclient").join(BASE_CONFIG_FILENAME))
}

/// Processes and merges all possible configuration sources.
///
/// Sources are layered lowest priority first: system file, user file, environment.
/// The command line goes on top via [`merge_provider`](Self::merge_provider), and the
/// hard-wired defaults underneath via [`apply_system_default`](Self::apply_system_default).
///
/// To see which files apply on the current platform, run `ftclient --config-files`.
#[derive(Debug, Clone)]
pub struct Manager {
    /// Configuration data
    data: Figment,
}

impl Manager {
    /// Constructor. Reads the given files (lowest priority first), then the environment.
    pub(super) fn build(files: &[(&str, Option<PathBuf>)], apply_env: bool) -> Self {
        let mut new1 = Self {
            data: Figment::new(),
        };
        for (what, path) in files {
            new1.add_config(what, path.as_ref());
        }
        if apply_env {
            new1.merge_provider(Env::prefixed(ENV_PREFIX));
        }
        new1
    }

    /// Internal constructor without any files
    pub(super) fn new(apply_env: bool, apply_config_files: bool) -> Self {
        if apply_config_files {
            Self::build(
                &[
                    ("system", system_config_path()),
                    ("user", user_config_path()),
                ],
                apply_env,
            )
        } else {
            Self::build(&[], apply_env)
        }
    }

    /// General constructor for production use
    ///
    /// Initialises this structure, reading the set of config files appropriate to the platform
    /// and the current user, and the environment.
    #[must_use]
    pub fn standard() -> Self {
        Self::new(true, true)
    }

    /// Testing constructor; does not read files or the environment, DOES apply the system default.
    #[must_use]
    #[cfg(test)]
    pub(crate) fn without_files() -> Self {
        let mut new1 = Self::new(false, false);
        new1.apply_system_default();
        new1
    }

    fn add_config(&mut self, what: &str, path: Option<&PathBuf>) {
        let Some(path) = path else {
            debug!("no {what} configuration file on this platform");
            return;
        };
        if !path.exists() {
            debug!("{what} configuration file {path:?} not present");
            return;
        }
        debug!("reading {what} configuration file {path:?}");
        self.merge_provider(Toml::file_exact(path));
    }

    /// Returns the list of configuration files we read.
    ///
    /// This is a function of platform and the current user.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        [system_config_path(), user_config_path()]
            .into_iter()
            .flatten()
            .map(|p| p.as_os_str().to_string_lossy().to_string())
            .collect()
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    /// This uses figment's `merge` operation, which prefers to _replace_ existing items.
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider); // in the error case, this leaves the figment in a fused state
    }

    /// Applies the system default settings, at a lower priority than everything else
    pub fn apply_system_default(&mut self) {
        let f = std::mem::take(&mut self.data);
        self.data = f.join(super::SystemDefault {});
    }

    /// Attempts to extract a particular struct from the data.
    pub fn get<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.data
            .extract::<T>()
            .context("invalid configuration")
    }

    /// Extracts and validates the complete [`Configuration`]
    pub fn configuration(&self) -> Result<Configuration> {
        self.get::<Configuration>()?.validate()
    }

    /// Creates a displayable adapter showing each field, its value and where it came from
    #[must_use]
    pub fn to_display_adapter(&self) -> DisplayAdapter<'_> {
        DisplayAdapter { source: self }
    }
}

/// Pretty-prints the merged [`Configuration`] with the origin of each value
#[derive(Debug, Clone, Copy)]
pub struct DisplayAdapter<'a> {
    source: &'a Manager,
}

impl Display for DisplayAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = match self.source.get::<Configuration>() {
            Ok(c) => c,
            Err(e) => return writeln!(f, "{e:#}"),
        };
        writeln!(f, "{HEADER}{:<18} {:<28} {}{RESET}", "Field", "Value", "Origin")?;
        for field in Configuration::FIELD_NAMES {
            let value = config.field_value(field).unwrap_or_default();
            let origin = self
                .source
                .data
                .find_metadata(field)
                .map(|md| match &md.source {
                    Some(src) => format!("{} ({src})", md.name),
                    None => md.name.to_string(),
                })
                .unwrap_or_default();
            writeln!(f, "{field:<18} {value:<28} {origin}")?;
        }
        Ok(())
    }
}
