mod progress;
mod resize;

pub use progress::{FailureRecord, GenerationReport};
pub use resize::target_dimensions;

use crate::ThumbnailConfig;
use crate::gallery::{GalleryError, GalleryPath, PathMirror};
use crate::media::{ImageExtensions, is_hidden};
use progress::Progress;
use rayon::prelude::*;
use resize::{JobOutcome, run_job};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Path error: {0}")]
    Path(#[from] GalleryError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub max_dimension: u32,
    pub extensions: ImageExtensions,
    /// Regenerate every thumbnail regardless of modification times.
    pub force: bool,
    /// Worker threads; 0 uses one per CPU.
    pub threads: usize,
    pub jpeg_quality: u8,
}

impl GeneratorOptions {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension,
            ..Self::from_config(&ThumbnailConfig::default())
        }
    }

    pub fn from_config(config: &ThumbnailConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            extensions: ImageExtensions::new(&config.extensions),
            force: false,
            threads: config.threads,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// One source image and where its thumbnail goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub max_dimension: u32,
}

/// Write a thumbnail for every image under `source_root` to the same relative
/// path under `dest_root`. Thumbnails newer than their original are skipped
/// unless `options.force` is set; per-file failures end up in the report.
pub fn generate(
    source_root: &Path,
    dest_root: &Path,
    options: &GeneratorOptions,
) -> Result<GenerationReport, GeneratorError> {
    let source_metadata = std::fs::metadata(source_root).map_err(|e| {
        GeneratorError::Configuration(format!(
            "Input directory {:?} is not accessible: {}",
            source_root, e
        ))
    })?;
    if !source_metadata.is_dir() {
        return Err(GeneratorError::Configuration(format!(
            "Input path {:?} is not a directory",
            source_root
        )));
    }
    if options.max_dimension == 0 {
        return Err(GeneratorError::Configuration(
            "Maximum dimension must be greater than zero".to_string(),
        ));
    }

    std::fs::create_dir_all(dest_root).map_err(|e| {
        GeneratorError::Configuration(format!(
            "Output directory {:?} could not be created: {}",
            dest_root, e
        ))
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads)
        .build()?;

    let mirror = PathMirror::new(source_root, dest_root);
    let progress = Progress::default();

    info!("Scanning {:?} for images...", source_root);
    let jobs = discover_jobs(&mirror, options, &progress);
    if jobs.is_empty() {
        info!("No image files found in {:?}", source_root);
    } else {
        info!(
            "Found {} image files, writing thumbnails to {:?} using {} threads",
            jobs.len(),
            dest_root,
            pool.current_num_threads()
        );
    }

    pool.install(|| {
        jobs.par_iter().for_each(|job| {
            match run_job(job, options.force, options.jpeg_quality) {
                Ok(JobOutcome::Skipped) => {
                    debug!("Up to date: {:?}", job.destination);
                    progress.record_skipped();
                }
                Ok(JobOutcome::Resized) | Ok(JobOutcome::Copied) => progress.record_generated(),
                Err(e) => {
                    warn!("Error processing {:?}: {}", job.source, e);
                    progress.record_failure(job.source.clone(), e.to_string());
                }
            }
        })
    });

    let report = progress.into_report();
    info!(
        generated = report.generated,
        skipped = report.skipped,
        failed = report.failed,
        "Thumbnail generation complete"
    );

    Ok(report)
}

fn discover_jobs(
    mirror: &PathMirror,
    options: &GeneratorOptions,
    progress: &Progress,
) -> Vec<GenerationJob> {
    let source_root = mirror.source_root();
    let excluded = nested_output_dir(source_root, mirror.thumbnail_root());

    let walker = WalkDir::new(source_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let hidden = entry.file_name().to_str().map(is_hidden).unwrap_or(false);
            !hidden && excluded.as_deref() != Some(entry.path())
        });

    let mut jobs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| source_root.to_path_buf());
                warn!("Failed to read {:?}: {}", path, e);
                progress.record_failure(path, e.to_string());
                continue;
            }
        };

        if !entry.file_type().is_file() || !options.extensions.is_image(entry.path()) {
            continue;
        }

        let job = entry
            .path()
            .strip_prefix(source_root)
            .map_err(|_| GalleryError::InvalidPath)
            .and_then(GalleryPath::from_relative)
            .and_then(|relative| mirror.thumbnail_file(&relative));

        match job {
            Ok(destination) => jobs.push(GenerationJob {
                source: entry.path().to_path_buf(),
                destination,
                max_dimension: options.max_dimension,
            }),
            Err(e) => {
                warn!("Skipping {:?}: {}", entry.path(), e);
                progress.record_failure(entry.path().to_path_buf(), e.to_string());
            }
        }
    }

    jobs
}

/// The output directory as seen while walking the source tree, when it lives
/// inside it. Walking into it would thumbnail the thumbnails.
fn nested_output_dir(source_root: &Path, dest_root: &Path) -> Option<PathBuf> {
    let source = source_root.canonicalize().ok()?;
    let dest = dest_root.canonicalize().ok()?;
    let relative = dest.strip_prefix(&source).ok()?;
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(source_root.join(relative))
}
