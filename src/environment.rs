//! # Desktop Environments
//!
//! Maps a desktop environment identifier (as typed on the command line) to
//! the command that sets the wallpaper there.
//!
//! Each [`CommandTemplate`] serves one or more identifiers, e.g. GNOME,
//! GNOME 2 and Cinnamon all read `org.gnome.desktop.background`. Arguments
//! may contain two placeholders which are replaced literally:
//!
//! - `{0}`: absolute path of the picture
//! - `{1}`: the secondary path parameter (only xfce4 uses it, as the
//!   xfconf property of the monitor to change)
//!
//! Commands are spawned directly with an argument vector, never through a
//! shell, so paths containing spaces or quotes arrive unmodified.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// Running `gsettings` from cron or at login needs these, see issue #3.
const GSETTINGS_ENV: &[(&str, &str)] = &[("DISPLAY", ":0"), ("GSETTINGS_BACKEND", "dconf")];

/// A parameterized wallpaper command and the environments it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: &'static str,
    pub args: &'static [&'static str],
    /// Extra environment variables for the child process
    pub envs: &'static [(&'static str, &'static str)],
    /// Environment identifiers resolving to this template (non-empty)
    pub members: &'static [&'static str],
}

/// All supported desktop environments.
pub const BUILTIN_TEMPLATES: &[CommandTemplate] = &[
    CommandTemplate {
        program: "/usr/bin/gsettings",
        args: &["set", "org.gnome.desktop.background", "picture-uri", "file://{0}"],
        envs: GSETTINGS_ENV,
        members: &["gnome", "gnome2", "cinnamon"],
    },
    CommandTemplate {
        program: "/usr/bin/gsettings",
        args: &["set", "org.mate.background", "picture-filename", "{0}"],
        envs: GSETTINGS_ENV,
        members: &["mate"],
    },
    CommandTemplate {
        program: "xfconf-query",
        args: &["-c", "xfce4-desktop", "-p", "{1}", "-s", "{0}"],
        envs: &[("DISPLAY", ":0")],
        members: &["xfce4"],
    },
    CommandTemplate {
        program: "wal",
        args: &["-i", "{0}"],
        envs: &[],
        members: &["wal", "pywal"],
    },
    CommandTemplate {
        program: "feh",
        args: &["--bg-scale", "{0}"],
        envs: &[],
        members: &["feh"],
    },
    CommandTemplate {
        program: "plasma-apply-wallpaperimage",
        args: &["{0}"],
        envs: &[],
        members: &["kde", "plasma"],
    },
    CommandTemplate {
        program: "swaymsg",
        args: &["output", "*", "bg", "{0}", "fill"],
        envs: &[],
        members: &["sway"],
    },
];

impl CommandTemplate {
    /// Fills in both placeholders, producing a ready-to-spawn command.
    pub fn substitute(&self, picture: &Path, secondary: &str) -> ApplyCommand {
        let picture = picture.to_string_lossy();
        let args = self
            .args
            .iter()
            .map(|arg| arg.replace("{0}", &picture).replace("{1}", secondary))
            .collect();

        ApplyCommand {
            program: self.program.to_string(),
            args,
            envs: self
                .envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// A fully substituted wallpaper command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyCommand {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl fmt::Display for ApplyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Lookup table from environment identifier to its command template.
///
/// The template list is inverted once at construction, so resolving is a
/// single hash lookup.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    by_environment: HashMap<&'static str, &'static CommandTemplate>,
}

impl EnvironmentRegistry {
    /// Builds a registry, rejecting tables where an identifier appears in
    /// more than one template.
    pub fn new(templates: &'static [CommandTemplate]) -> Result<Self> {
        let mut by_environment = HashMap::new();
        for template in templates {
            for &member in template.members {
                if by_environment.insert(member, template).is_some() {
                    return Err(Error::DuplicateEnvironment(member.to_string()));
                }
            }
        }
        Ok(Self { by_environment })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(BUILTIN_TEMPLATES)
    }

    pub fn resolve(&self, environment: &str) -> Result<&'static CommandTemplate> {
        self.by_environment
            .get(environment)
            .copied()
            .ok_or_else(|| Error::UnsupportedEnvironment(environment.to_string()))
    }

    /// Supported identifiers, sorted.
    pub fn environments(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_environment.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
