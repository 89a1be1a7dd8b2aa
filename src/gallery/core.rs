use super::{
    BreadcrumbItem, DirectoryEntry, Gallery, GalleryError, GalleryNode, GalleryPath, ImageEntry,
    ListingPage, browse_url, resolve_within_async,
};
use crate::media::{ImageExtensions, is_hidden, media_type};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// List the immediate children of `relative_path` under `root`.
///
/// Only subdirectories and recognized images are returned; hidden entries and
/// other files are skipped. Directories come first, then images, each group
/// ordered case-insensitively by name.
pub async fn list(
    root: &Path,
    relative_path: &str,
    extensions: &ImageExtensions,
) -> Result<Vec<GalleryNode>, GalleryError> {
    let path = GalleryPath::parse(relative_path)?;
    list_path(root, &path, extensions).await
}

pub(crate) async fn list_path(
    root: &Path,
    path: &GalleryPath,
    extensions: &ImageExtensions,
) -> Result<Vec<GalleryNode>, GalleryError> {
    let full_path = resolve_within_async(root, path).await?;

    debug!("Scanning directory: {:?}", full_path);

    let metadata = match tokio::fs::metadata(&full_path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(GalleryError::NotFound),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Err(GalleryError::NotFound);
    }

    let mut nodes = Vec::new();
    let mut entries = tokio::fs::read_dir(&full_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(name) => {
                debug!("Skipping entry with non UTF-8 name: {:?}", name);
                continue;
            }
        };

        if is_hidden(&file_name) {
            continue;
        }

        // Names that would not survive a round trip through a URL are unreachable.
        let item_path = match path.child(&file_name) {
            Ok(item_path) if item_path.segments().len() == path.segments().len() + 1 => item_path,
            _ => {
                debug!("Skipping entry with unsupported name: {:?}", file_name);
                continue;
            }
        };

        // Follows symlinks, unlike `entry.metadata()`.
        let metadata = match tokio::fs::metadata(entry.path()).await {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping unreadable entry {:?}: {}", entry.path(), e);
                continue;
            }
        };

        if metadata.is_dir() {
            nodes.push(GalleryNode::Directory(DirectoryEntry::new(item_path)));
        } else if metadata.is_file() && extensions.is_image_name(&file_name) {
            let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
            nodes.push(GalleryNode::Image(ImageEntry::new(
                item_path,
                metadata.len(),
                modified,
                media_type(Path::new(&file_name)),
            )));
        }
    }

    sort_nodes(&mut nodes);

    debug!(
        "Found {} items total ({} directories, {} images)",
        nodes.len(),
        nodes.iter().filter(|n| n.is_directory()).count(),
        nodes.iter().filter(|n| !n.is_directory()).count()
    );

    Ok(nodes)
}

fn sort_nodes(nodes: &mut [GalleryNode]) {
    nodes.sort_by(|a, b| match (a.is_directory(), b.is_directory()) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a
            .name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.name().cmp(b.name())),
    });
}

impl Gallery {
    pub async fn scan_directory(&self, path: &GalleryPath) -> Result<Vec<GalleryNode>, GalleryError> {
        list_path(&self.config.source_directory, path, &self.extensions).await
    }

    /// All subdirectories plus one page of images. `page` is 1-based; a page
    /// past the end is reported as not found.
    pub async fn list_directory(
        &self,
        path: &GalleryPath,
        page: usize,
    ) -> Result<ListingPage, GalleryError> {
        let nodes = self.scan_directory(path).await?;

        let mut directories = Vec::new();
        let mut images = Vec::new();
        for node in nodes {
            match node {
                GalleryNode::Directory(dir) => directories.push(dir),
                GalleryNode::Image(image) => images.push(image),
            }
        }

        let images_per_page = self.config.images_per_page.max(1);
        let total_images = images.len();
        let total_pages = total_images.div_ceil(images_per_page).max(1);

        if page == 0 || page > total_pages {
            return Err(GalleryError::NotFound);
        }

        let paginated_images: Vec<ImageEntry> = images
            .into_iter()
            .skip((page - 1) * images_per_page)
            .take(images_per_page)
            .collect();

        debug!(
            "Pagination: page={}, total_pages={}, total_images={}, returning {} images",
            page,
            total_pages,
            total_images,
            paginated_images.len()
        );

        Ok(ListingPage {
            path: path.clone(),
            parent_url: path.parent().map(|parent| browse_url(&parent)),
            directories,
            images: paginated_images,
            current_page: page,
            total_pages,
            total_images,
            has_prev: page > 1,
            has_next: page < total_pages,
        })
    }

    /// Metadata for a single image in the source tree.
    pub async fn get_image(&self, path: &GalleryPath) -> Result<ImageEntry, GalleryError> {
        if !self.is_image(path) {
            return Err(GalleryError::NotFound);
        }

        let full_path = self.mirror.locate_source(path).await?;
        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(GalleryError::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(GalleryError::NotFound),
            Err(e) => return Err(e.into()),
        };

        Ok(ImageEntry::new(
            path.clone(),
            metadata.len(),
            metadata.modified().ok().map(DateTime::<Utc>::from),
            media_type(&full_path),
        ))
    }

    pub fn build_breadcrumbs(&self, path: &GalleryPath) -> Vec<BreadcrumbItem> {
        let mut breadcrumbs = vec![BreadcrumbItem {
            name: "Home".to_string(),
            url: "/".to_string(),
        }];

        let mut current = GalleryPath::root();
        for segment in path.segments() {
            current = match current.child(segment) {
                Ok(next) => next,
                Err(_) => break,
            };
            breadcrumbs.push(BreadcrumbItem {
                name: segment.clone(),
                url: browse_url(&current),
            });
        }

        breadcrumbs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GalleryConfig;
    use tempfile::TempDir;

    fn build_tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("Zeta")).unwrap();
        std::fs::create_dir_all(root.join("alpha/nested")).unwrap();
        std::fs::create_dir_all(root.join(".cache")).unwrap();
        for name in ["b.jpg", "A.png", "c.JPG", "notes.txt", ".hidden.jpg"] {
            std::fs::write(root.join(name), b"not really an image").unwrap();
        }
        std::fs::write(root.join("alpha/inside.gif"), b"gif").unwrap();
        temp_dir
    }

    fn names(nodes: &[GalleryNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    fn gallery_for(root: &Path, images_per_page: usize) -> Gallery {
        Gallery::new(
            GalleryConfig {
                source_directory: root.to_path_buf(),
                thumbnail_directory: root.join("thumbs-not-created"),
                images_per_page,
            },
            ImageExtensions::default(),
        )
    }

    #[tokio::test]
    async fn test_list_orders_directories_first_case_insensitive() {
        let temp_dir = build_tree();
        let nodes = list(temp_dir.path(), "/", &ImageExtensions::default())
            .await
            .unwrap();

        assert_eq!(names(&nodes), ["alpha", "Zeta", "A.png", "b.jpg", "c.JPG"]);
        assert!(nodes[0].is_directory());
        assert!(nodes[1].is_directory());
        assert!(nodes[2..].iter().all(|n| !n.is_directory()));
    }

    #[tokio::test]
    async fn test_list_is_deterministic() {
        let temp_dir = build_tree();
        let extensions = ImageExtensions::default();
        let first = list(temp_dir.path(), "/", &extensions).await.unwrap();
        let second = list(temp_dir.path(), "/", &extensions).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_is_not_recursive() {
        let temp_dir = build_tree();
        let nodes = list(temp_dir.path(), "alpha", &ImageExtensions::default())
            .await
            .unwrap();

        assert_eq!(names(&nodes), ["nested", "inside.gif"]);
        assert_eq!(nodes[1].path().to_string(), "alpha/inside.gif");
        match &nodes[1] {
            GalleryNode::Image(image) => {
                assert_eq!(image.media_type, "image/gif");
                assert_eq!(image.size, 3);
                assert_eq!(image.thumbnail_url, "/thumb/alpha/inside.gif");
                assert_eq!(image.full_url, "/full/alpha/inside.gif");
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_errors() {
        let temp_dir = build_tree();
        let extensions = ImageExtensions::default();

        assert!(matches!(
            list(temp_dir.path(), "missing", &extensions).await,
            Err(GalleryError::NotFound)
        ));
        assert!(matches!(
            list(temp_dir.path(), "b.jpg", &extensions).await,
            Err(GalleryError::NotFound)
        ));
        assert!(matches!(
            list(temp_dir.path(), "../", &extensions).await,
            Err(GalleryError::InvalidPath)
        ));
        assert!(matches!(
            list(temp_dir.path(), "alpha/../../", &extensions).await,
            Err(GalleryError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn test_list_directory_paginates_images() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("sub")).unwrap();
        for i in 0..5 {
            std::fs::write(temp_dir.path().join(format!("img_{}.jpg", i)), b"x").unwrap();
        }
        let gallery = gallery_for(temp_dir.path(), 2);
        let root = GalleryPath::root();

        let first = gallery.list_directory(&root, 1).await.unwrap();
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_images, 5);
        assert_eq!(first.directories.len(), 1);
        assert_eq!(first.images.len(), 2);
        assert!(!first.has_prev);
        assert!(first.has_next);
        assert!(first.parent_url.is_none());

        let last = gallery.list_directory(&root, 3).await.unwrap();
        assert_eq!(last.images.len(), 1);
        assert_eq!(last.images[0].name, "img_4.jpg");
        assert!(last.has_prev);
        assert!(!last.has_next);

        assert!(matches!(
            gallery.list_directory(&root, 4).await,
            Err(GalleryError::NotFound)
        ));
        assert!(matches!(
            gallery.list_directory(&root, 0).await,
            Err(GalleryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_directory_has_one_page() {
        let temp_dir = TempDir::new().unwrap();
        let gallery = gallery_for(temp_dir.path(), 10);
        let listing = gallery.list_directory(&GalleryPath::root(), 1).await.unwrap();
        assert_eq!(listing.total_pages, 1);
        assert!(listing.images.is_empty());
    }

    #[test]
    fn test_breadcrumbs() {
        let temp_dir = TempDir::new().unwrap();
        let gallery = gallery_for(temp_dir.path(), 10);
        let breadcrumbs = gallery.build_breadcrumbs(&GalleryPath::parse("a/b c").unwrap());

        assert_eq!(breadcrumbs.len(), 3);
        assert_eq!(breadcrumbs[0].url, "/");
        assert_eq!(breadcrumbs[1].url, "/browse/a");
        assert_eq!(breadcrumbs[2].name, "b c");
        assert_eq!(breadcrumbs[2].url, "/browse/a/b%20c");
    }
}
