//! # Fetch and Apply
//!
//! Makes sure today's picture is downloaded and set as the wallpaper:
//!
//! 1. If `<directory>/<identifier>` already exists the picture counts as
//!    done. Nothing else happens unless a re-apply was requested.
//! 2. Otherwise wait a moment, stream the image to disk and optionally
//!    save the story next to it as `<name>.txt`.
//! 3. Run the wallpaper command for the configured environment. A failing
//!    command is reported but does not stop the run.
//! 4. Show the picture story as a desktop notification.
//!
//! Presence of the image file is the only thing checked; its content is
//! never validated. A download that fails halfway removes its partial file
//! so the next run starts over. The same goes for a requested story file
//! that cannot be written: the picture is removed again, otherwise later
//! runs would skip the download and never write the story.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::bing::{ImageMetadata, ImageSource};
use crate::config::ApplyConfig;
use crate::environment::EnvironmentRegistry;
use crate::error::{Error, Result};
use crate::host::{ApplyStatus, Launcher, Notification, Notifier};

/// Pause before downloading. Without it a wallpaper set right after login
/// gets overwritten when the desktop restores its saved background.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Files a run leaves on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub picture: PathBuf,
    /// Same path as the picture with a `.txt` extension
    pub caption: PathBuf,
}

impl Artifact {
    pub fn new(directory: &Path, identifier: &str) -> Self {
        let picture = directory.join(identifier);
        let caption = picture.with_extension("txt");
        Self { picture, caption }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The picture was already on disk and no re-apply was requested
    AlreadyDownloaded(PathBuf),
    /// The wallpaper command ran (successfully or not) and the story was shown
    Applied { picture: PathBuf, status: ApplyStatus },
}

pub struct Orchestrator<'a, S, L, N> {
    config: &'a ApplyConfig,
    registry: &'a EnvironmentRegistry,
    source: &'a S,
    launcher: &'a L,
    notifier: &'a N,
    settle_delay: Duration,
}

impl<'a, S, L, N> Orchestrator<'a, S, L, N>
where
    S: ImageSource,
    L: Launcher,
    N: Notifier,
{
    pub fn new(
        config: &'a ApplyConfig,
        registry: &'a EnvironmentRegistry,
        source: &'a S,
        launcher: &'a L,
        notifier: &'a N,
    ) -> Self {
        Self {
            config,
            registry,
            source,
            launcher,
            notifier,
            settle_delay: SETTLE_DELAY,
        }
    }

    /// Fetches today's metadata, then runs [`Self::apply`].
    pub async fn fetch_and_apply(&self) -> Result<Outcome> {
        let metadata = self.source.fetch_metadata().await?;
        self.apply(&metadata).await
    }

    pub async fn apply(&self, metadata: &ImageMetadata) -> Result<Outcome> {
        let artifact = Artifact::new(&self.config.directory, &metadata.identifier);

        if artifact.picture.exists() {
            info!("You have downloaded the picture before.");
            info!("Have a look at it --> {}", artifact.picture.display());
            if !self.config.force_reapply {
                return Ok(Outcome::AlreadyDownloaded(artifact.picture));
            }
        } else {
            self.download(metadata, &artifact).await?;
        }

        let status = self.set_wallpaper(&artifact.picture)?;
        self.notifier.notify(&Notification::story(&metadata.caption));

        Ok(Outcome::Applied { picture: artifact.picture, status })
    }

    async fn download(&self, metadata: &ImageMetadata, artifact: &Artifact) -> Result<()> {
        tokio::time::sleep(self.settle_delay).await;

        let path = &artifact.picture;
        if let Err(e) = self.stream_to(&metadata.url, path).await {
            // A leftover partial file would look like a finished download.
            remove_picture(path).await;
            return Err(e);
        }
        info!("Successfully downloaded the picture to --> {}", path.display());

        if self.config.save_caption {
            if let Err(e) = tokio::fs::write(&artifact.caption, &metadata.caption).await {
                remove_picture(path).await;
                return Err(Error::io(&artifact.caption, e));
            }
            info!("Successfully saved the picture story to --> {}", artifact.caption.display());
        }

        Ok(())
    }

    async fn stream_to(&self, url: &str, path: &Path) -> Result<()> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| Error::io(path, e))?;

        self.source.download(url, &mut file).await.map_err(|e| match e {
            Error::Io { source, .. } => Error::io(path, source),
            other => other,
        })?;

        file.flush().await.map_err(|e| Error::io(path, e))
    }

    fn set_wallpaper(&self, picture: &Path) -> Result<ApplyStatus> {
        let command = self
            .registry
            .resolve(&self.config.environment)?
            .substitute(picture, &self.config.secondary_path);

        let status = match self.launcher.run(&command) {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to run `{command}`: {e}");
                ApplyStatus::Failed(None)
            }
        };

        match status {
            ApplyStatus::Succeeded => info!("Successfully set the picture as the wallpaper. :)"),
            ApplyStatus::Failed(code) => {
                warn!(?code, "Something bad happened, fail to set as wallpaper :(")
            }
        }
        Ok(status)
    }
}

async fn remove_picture(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove incomplete download {}: {e}", path.display());
        }
    }
}
