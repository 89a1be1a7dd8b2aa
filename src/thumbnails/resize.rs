use super::{GenerationJob, GeneratorError};
use image::{DynamicImage, ImageFormat, codecs::jpeg::JpegEncoder, imageops::FilterType};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JobOutcome {
    Resized,
    /// Source already fits; its bytes were copied unchanged.
    Copied,
    Skipped,
}

/// Dimensions with the longer edge scaled to `max_dimension`, keeping the
/// aspect ratio. Images that already fit are returned unchanged.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    if width >= height {
        let h = (height as f64 * max_dimension as f64 / width as f64).round() as u32;
        (max_dimension, h.max(1))
    } else {
        let w = (width as f64 * max_dimension as f64 / height as f64).round() as u32;
        (w.max(1), max_dimension)
    }
}

/// A destination is fresh when it exists and is not older than its source.
pub(crate) fn is_fresh(source: &Path, destination: &Path) -> bool {
    let (Ok(source_meta), Ok(dest_meta)) =
        (std::fs::metadata(source), std::fs::metadata(destination))
    else {
        return false;
    };

    match (source_meta.modified(), dest_meta.modified()) {
        (Ok(source_modified), Ok(dest_modified)) => {
            dest_meta.is_file() && dest_modified >= source_modified
        }
        _ => false,
    }
}

pub(crate) fn run_job(
    job: &GenerationJob,
    force: bool,
    jpeg_quality: u8,
) -> Result<JobOutcome, GeneratorError> {
    if !force && is_fresh(&job.source, &job.destination) {
        return Ok(JobOutcome::Skipped);
    }

    if let Some(parent) = job.destination.parent() {
        // Idempotent, so concurrent workers may race on the same directory.
        std::fs::create_dir_all(parent)?;
    }

    // Content decides the decoder; the extension may lie.
    let reader = image::ImageReader::open(&job.source)?.with_guessed_format()?;
    let format = match reader.format() {
        Some(format) => format,
        None => ImageFormat::from_path(&job.source)?,
    };
    let img = reader.decode()?;
    let (width, height) = (img.width(), img.height());
    let (target_width, target_height) = target_dimensions(width, height, job.max_dimension);

    let temp_path = temp_path_for(&job.destination);
    let written = if (target_width, target_height) == (width, height) {
        std::fs::copy(&job.source, &temp_path)
            .map(|_| JobOutcome::Copied)
            .map_err(GeneratorError::from)
    } else {
        let resized = img.resize_exact(target_width, target_height, FilterType::Lanczos3);
        save_image(&resized, &temp_path, format, jpeg_quality).map(|_| JobOutcome::Resized)
    };
    let result = written.and_then(|outcome| {
        std::fs::rename(&temp_path, &job.destination)?;
        Ok(outcome)
    });

    match result {
        Ok(outcome) => {
            debug!(
                "{:?} {:?} -> {:?} ({}x{} -> {}x{})",
                outcome,
                job.source,
                job.destination,
                width,
                height,
                target_width,
                target_height
            );
            Ok(outcome)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn save_image(
    image: &DynamicImage,
    path: &Path,
    format: ImageFormat,
    jpeg_quality: u8,
) -> Result<(), GeneratorError> {
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let writer = BufWriter::new(File::create(path)?);
            let encoder = JpegEncoder::new_with_quality(writer, jpeg_quality);
            rgb.write_with_encoder(encoder)?;
        }
        other => image.save_with_format(path, other)?,
    }
    Ok(())
}

/// Hidden sibling of the destination, renamed into place once complete so an
/// interrupted run never leaves a truncated file that looks fresh.
fn temp_path_for(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.tmp", file_name))
}
