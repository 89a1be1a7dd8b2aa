// Gallery module - directory index, path containment and image serving
mod core;
mod error;
mod handlers;
mod path;
mod serve;
mod types;

// Re-export public items
pub use self::core::list;
pub use error::GalleryError;
pub use handlers::{
    gallery_handler, gallery_root_handler, image_detail_handler, original_handler,
    thumbnail_handler,
};
pub use path::{GalleryPath, PathMirror, resolve_within, resolve_within_async};
pub use serve::ThumbnailSource;
pub use types::*;

use crate::media::ImageExtensions;
use std::sync::Arc;

pub type SharedGallery = Arc<Gallery>;

/// Read-only view over the source and thumbnail trees.
pub struct Gallery {
    pub(crate) config: crate::GalleryConfig,
    pub(crate) mirror: PathMirror,
    pub(crate) extensions: ImageExtensions,
}

impl Gallery {
    pub fn new(config: crate::GalleryConfig, extensions: ImageExtensions) -> Self {
        let mirror = PathMirror::new(
            config.source_directory.clone(),
            config.thumbnail_directory.clone(),
        );

        Self {
            config,
            mirror,
            extensions,
        }
    }

    pub(crate) fn is_image(&self, path: &GalleryPath) -> bool {
        path.file_name()
            .map(|name| self.extensions.is_image_name(name))
            .unwrap_or(false)
    }
}
