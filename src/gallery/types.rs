use super::GalleryPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: GalleryPath,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageEntry {
    pub name: String,
    pub path: GalleryPath,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub media_type: String,
    pub thumbnail_url: String,
    pub full_url: String,
    pub detail_url: String,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GalleryNode {
    Directory(DirectoryEntry),
    Image(ImageEntry),
}

impl GalleryNode {
    pub fn name(&self) -> &str {
        match self {
            GalleryNode::Directory(dir) => &dir.name,
            GalleryNode::Image(image) => &image.name,
        }
    }

    pub fn path(&self) -> &GalleryPath {
        match self {
            GalleryNode::Directory(dir) => &dir.path,
            GalleryNode::Image(image) => &image.path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, GalleryNode::Directory(_))
    }
}

impl DirectoryEntry {
    pub fn new(path: GalleryPath) -> Self {
        Self {
            name: path.file_name().unwrap_or_default().to_string(),
            url: browse_url(&path),
            path,
        }
    }
}

impl ImageEntry {
    pub fn new(
        path: GalleryPath,
        size: u64,
        modified: Option<DateTime<Utc>>,
        media_type: String,
    ) -> Self {
        let encoded = path.url_path();
        Self {
            name: path.file_name().unwrap_or_default().to_string(),
            thumbnail_url: format!("/thumb/{}", encoded),
            full_url: format!("/full/{}", encoded),
            detail_url: format!("/image/{}", encoded),
            path,
            size,
            modified,
            media_type,
        }
    }
}

pub fn browse_url(path: &GalleryPath) -> String {
    if path.is_root() {
        "/".to_string()
    } else {
        format!("/browse/{}", path.url_path())
    }
}

/// A directory listing with its images split into pages. Pages are 1-based.
#[derive(Debug, Clone, Serialize)]
pub struct ListingPage {
    pub path: GalleryPath,
    pub parent_url: Option<String>,
    pub directories: Vec<DirectoryEntry>,
    pub images: Vec<ImageEntry>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_images: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreadcrumbItem {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GalleryQuery {
    pub page: Option<usize>,
    pub format: Option<String>,
}
