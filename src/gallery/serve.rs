use super::{Gallery, GalleryError, GalleryPath};
use crate::media::media_type;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

/// Where the bytes for a thumbnail request come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailSource {
    Thumbnail(PathBuf),
    /// No thumbnail has been generated yet; the original is served instead.
    Original(PathBuf),
}

impl Gallery {
    /// Resolve a thumbnail request: the mirrored thumbnail file if it exists,
    /// else the original, else not found.
    pub async fn resolve_thumbnail(
        &self,
        path: &GalleryPath,
    ) -> Result<ThumbnailSource, GalleryError> {
        if !self.is_image(path) {
            return Err(GalleryError::NotFound);
        }

        let thumbnail_file = self.mirror.locate_thumbnail(path).await?;
        if is_regular_file(&thumbnail_file).await? {
            return Ok(ThumbnailSource::Thumbnail(thumbnail_file));
        }

        let original = self.resolve_original(path).await?;
        debug!("No thumbnail for {}, falling back to original", path);
        Ok(ThumbnailSource::Original(original))
    }

    pub async fn resolve_original(&self, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
        if !self.is_image(path) {
            return Err(GalleryError::NotFound);
        }

        let original = self.mirror.locate_source(path).await?;
        if is_regular_file(&original).await? {
            Ok(original)
        } else {
            Err(GalleryError::NotFound)
        }
    }

    pub async fn serve_thumbnail(&self, raw_path: &str) -> Response {
        let result: Result<Response, GalleryError> = async {
            let path = GalleryPath::parse(raw_path)?;
            match self.resolve_thumbnail(&path).await? {
                ThumbnailSource::Thumbnail(file) => {
                    serve_file(&file, "public, max-age=86400").await
                }
                ThumbnailSource::Original(file) => serve_file(&file, "public, max-age=300").await,
            }
        }
        .await;

        result.unwrap_or_else(IntoResponse::into_response)
    }

    pub async fn serve_original(&self, raw_path: &str) -> Response {
        let result: Result<Response, GalleryError> = async {
            let path = GalleryPath::parse(raw_path)?;
            let file = self.resolve_original(&path).await?;
            serve_file(&file, "public, max-age=86400").await
        }
        .await;

        result.unwrap_or_else(IntoResponse::into_response)
    }
}

async fn is_regular_file(path: &Path) -> Result<bool, GalleryError> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Stream a file with content type, length and validator headers.
async fn serve_file(path: &Path, cache_control: &'static str) -> Result<Response, GalleryError> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(GalleryError::NotFound),
        Err(e) => return Err(e.into()),
    };
    let metadata = file.metadata().await?;

    let mut headers = HeaderMap::new();
    if let Ok(content_type) = HeaderValue::from_str(&media_type(path)) {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );

    if let Ok(modified) = metadata.modified()
        && let Ok(duration) = modified.duration_since(UNIX_EPOCH)
    {
        if let Ok(last_modified) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
            headers.insert(header::LAST_MODIFIED, last_modified);
        }

        // ETag based on modification time and file size
        let etag = format!("\"{}-{}\"", duration.as_secs(), metadata.len());
        if let Ok(etag) = HeaderValue::from_str(&etag) {
            headers.insert(header::ETAG, etag);
        }
    }

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((StatusCode::OK, headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GalleryConfig;
    use crate::media::ImageExtensions;
    use tempfile::TempDir;

    fn setup() -> (Gallery, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("imgs");
        let thumbs = temp_dir.path().join("imgs-small");
        std::fs::create_dir_all(source.join("vacation")).unwrap();
        std::fs::create_dir_all(thumbs.join("vacation")).unwrap();
        std::fs::write(source.join("vacation/a.jpg"), b"original a").unwrap();
        std::fs::write(thumbs.join("vacation/a.jpg"), b"thumb a").unwrap();
        std::fs::write(source.join("vacation/b.jpg"), b"original b").unwrap();
        std::fs::write(source.join("vacation/readme.txt"), b"text").unwrap();

        let gallery = Gallery::new(
            GalleryConfig {
                source_directory: source,
                thumbnail_directory: thumbs,
                images_per_page: 100,
            },
            ImageExtensions::default(),
        );
        (gallery, temp_dir)
    }

    #[tokio::test]
    async fn test_resolve_thumbnail_prefers_thumbnail_tree() {
        let (gallery, temp_dir) = setup();
        let path = GalleryPath::parse("vacation/a.jpg").unwrap();
        assert_eq!(
            gallery.resolve_thumbnail(&path).await.unwrap(),
            ThumbnailSource::Thumbnail(temp_dir.path().join("imgs-small/vacation/a.jpg"))
        );
    }

    #[tokio::test]
    async fn test_resolve_thumbnail_falls_back_to_original() {
        let (gallery, temp_dir) = setup();
        let path = GalleryPath::parse("vacation/b.jpg").unwrap();
        assert_eq!(
            gallery.resolve_thumbnail(&path).await.unwrap(),
            ThumbnailSource::Original(temp_dir.path().join("imgs/vacation/b.jpg"))
        );
    }

    #[tokio::test]
    async fn test_resolve_thumbnail_missing_everywhere() {
        let (gallery, _temp_dir) = setup();
        let path = GalleryPath::parse("vacation/missing.jpg").unwrap();
        assert!(matches!(
            gallery.resolve_thumbnail(&path).await,
            Err(GalleryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_non_image_and_directory_are_not_served() {
        let (gallery, _temp_dir) = setup();
        assert_eq!(
            gallery.serve_original("vacation/readme.txt").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            gallery.serve_original("vacation").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_serve_rejects_traversal() {
        let (gallery, _temp_dir) = setup();
        assert_eq!(
            gallery.serve_thumbnail("../imgs/vacation/a.jpg").await.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            gallery.serve_original("vacation/../../secret.jpg").await.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn test_serve_sets_headers() {
        let (gallery, _temp_dir) = setup();
        let response = gallery.serve_original("vacation/a.jpg").await;
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(headers[header::CONTENT_LENGTH], "10");
        assert!(headers.contains_key(header::ETAG));
        assert!(headers.contains_key(header::LAST_MODIFIED));
    }
}
