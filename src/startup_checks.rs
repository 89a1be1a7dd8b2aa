use crate::Config;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Gallery source directory does not exist: {0}")]
    GallerySourceDirectoryMissing(String),

    #[error("Gallery source directory is not readable: {0}")]
    GallerySourceDirectoryUnreadable(String),

    #[error("Thumbnail directory does not exist, originals will be served instead: {0}")]
    ThumbnailDirectoryMissing(String),
}

impl StartupCheckError {
    /// Critical failures stop the server from starting.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::GallerySourceDirectoryMissing(_)
                | StartupCheckError::GallerySourceDirectoryUnreadable(_)
        )
    }
}

/// Log failed checks at a level matching their severity. Returns true when
/// any of them is critical.
pub fn log_failures(errors: &[StartupCheckError]) -> bool {
    for e in errors {
        if e.is_critical() {
            error!("Startup check failed: {}", e);
        } else {
            warn!("Startup check failed: {}", e);
        }
    }
    errors.iter().any(StartupCheckError::is_critical)
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let source_dir = Path::new(&config.gallery.source_directory);
    if !source_dir.is_dir() {
        error!("Gallery source directory does not exist: {:?}", source_dir);
        errors.push(StartupCheckError::GallerySourceDirectoryMissing(
            source_dir.display().to_string(),
        ));
    } else {
        match tokio::fs::read_dir(source_dir).await {
            Ok(_) => info!("Gallery source directory is accessible: {:?}", source_dir),
            Err(e) => {
                error!("Gallery source directory is not accessible: {}", e);
                errors.push(StartupCheckError::GallerySourceDirectoryUnreadable(
                    source_dir.display().to_string(),
                ));
            }
        }
    }

    let thumbnail_dir = Path::new(&config.gallery.thumbnail_directory);
    if !thumbnail_dir.is_dir() {
        warn!(
            "Thumbnail directory does not exist: {:?}; run the generate command to create it",
            thumbnail_dir
        );
        errors.push(StartupCheckError::ThumbnailDirectoryMissing(
            thumbnail_dir.display().to_string(),
        ));
    } else {
        info!("Thumbnail directory exists: {:?}", thumbnail_dir);
    }

    let templates_dir = Path::new(&config.templates.directory);
    if !templates_dir.exists() {
        info!(
            "Templates directory {:?} does not exist, using built-in templates",
            templates_dir
        );
    } else {
        info!("Templates directory exists: {:?}", templates_dir);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        Err(errors)
    }
}
