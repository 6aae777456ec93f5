//! # Host Commands
//!
//! Spawns the wallpaper command and the desktop notification on the host.
//! Inside a Flatpak sandbox both are routed through `flatpak-spawn --host`
//! so they run outside the sandbox.

use std::process::Command;

use tracing::{debug, warn};

use crate::environment::ApplyCommand;

/// Application name shown by the notification daemon.
pub const APP_NAME: &str = "wonderful-bing";

/// Freedesktop icon name for the notification.
const NOTIFY_ICON: &str = "preferences-desktop-wallpaper";

const NOTIFY_TITLE: &str = "Today's Picture Story";

/// Checks if the application is running inside a Flatpak sandbox.
pub fn is_flatpak() -> bool {
    std::path::Path::new("/.flatpak-info").exists()
}

/// Builds a [`Command`] for the host, prefixing `flatpak-spawn --host` when
/// sandboxed. Environment variables are passed with `--env=` in that case
/// since the sandbox environment does not reach the host process.
fn host_command(program: &str, args: &[String], envs: &[(String, String)]) -> Command {
    if is_flatpak() {
        let mut command = Command::new("flatpak-spawn");
        command.arg("--host");
        for (key, value) in envs {
            command.arg(format!("--env={key}={value}"));
        }
        command.arg(program).args(args);
        command
    } else {
        let mut command = Command::new(program);
        command.args(args).envs(envs.iter().map(|(k, v)| (k, v)));
        command
    }
}

/// How a wallpaper command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    Succeeded,
    /// Non-zero exit, with the code unless killed by a signal
    Failed(Option<i32>),
}

/// Runs wallpaper commands and waits for them.
pub trait Launcher {
    fn run(&self, command: &ApplyCommand) -> std::io::Result<ApplyStatus>;
}

/// Launches commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostLauncher;

impl Launcher for HostLauncher {
    fn run(&self, command: &ApplyCommand) -> std::io::Result<ApplyStatus> {
        debug!(%command, "running wallpaper command");
        let status = host_command(&command.program, &command.args, &command.envs).status()?;
        Ok(if status.success() {
            ApplyStatus::Succeeded
        } else {
            ApplyStatus::Failed(status.code())
        })
    }
}

/// A desktop notification about today's picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub app_name: String,
    pub icon: String,
    pub title: String,
    pub body: String,
}

impl Notification {
    /// The picture story notification. The caption is one argv element, so
    /// quotes in it need no escaping and are shown as-is.
    pub fn story(caption: &str) -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            icon: NOTIFY_ICON.to_string(),
            title: NOTIFY_TITLE.to_string(),
            body: caption.to_string(),
        }
    }
}

/// Shows notifications without waiting for them.
pub trait Notifier {
    fn notify(&self, notification: &Notification);
}

/// Sends notifications through `notify-send`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySend;

impl Notifier for NotifySend {
    fn notify(&self, notification: &Notification) {
        let args = [
            "-a".to_string(),
            notification.app_name.clone(),
            "-i".to_string(),
            notification.icon.clone(),
            notification.title.clone(),
            notification.body.clone(),
        ];
        // The child is not waited on.
        if let Err(e) = host_command("notify-send", &args, &[]).spawn() {
            warn!("Failed to show notification: {e}");
        }
    }
}
