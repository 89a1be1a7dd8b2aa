use super::GalleryError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Relative path made only of plain name segments, safe to join under a root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GalleryPath {
    segments: Vec<String>,
}

impl GalleryPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a user-supplied path such as a URL tail.
    ///
    /// Backslashes are treated as separators, empty and `.` segments are
    /// dropped and a leading `/` refers to the gallery root. Parent segments,
    /// UNC prefixes and NUL bytes are rejected, as are drive prefixes on Windows.
    pub fn parse(raw: &str) -> Result<Self, GalleryError> {
        if raw.contains('\0') {
            return Err(GalleryError::InvalidPath);
        }

        let normalized = raw.replace('\\', "/");
        if normalized.starts_with("//") {
            return Err(GalleryError::InvalidPath);
        }

        let mut segments = Vec::new();
        for segment in normalized.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(GalleryError::InvalidPath),
                s if segments.is_empty() && is_drive_prefix(s) => {
                    return Err(GalleryError::InvalidPath);
                }
                s => segments.push(s.to_string()),
            }
        }

        Ok(Self { segments })
    }

    /// Build a path from a filesystem path that is already relative to a root,
    /// e.g. the result of `strip_prefix` on a directory walk entry.
    pub fn from_relative(path: &Path) -> Result<Self, GalleryError> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or(GalleryError::InvalidPath)?;
                    segments.push(name.to_string());
                }
                Component::CurDir => continue,
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(GalleryError::InvalidPath);
                }
            }
        }
        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn parent(&self) -> Option<GalleryPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> Result<GalleryPath, GalleryError> {
        let name = Self::parse(name)?;
        let mut segments = self.segments.clone();
        segments.extend(name.segments);
        Ok(Self { segments })
    }

    pub fn to_relative_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }

    /// Percent-encoded form for use inside URLs; separators stay literal.
    pub fn url_path(&self) -> String {
        self.segments
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for GalleryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl Serialize for GalleryPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// `a:b.jpg` is an ordinary file name outside of Windows.
fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    cfg!(windows) && bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn join_within(root: &Path, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
    let joined = root.join(path.to_relative_path());
    if !joined.starts_with(root) {
        return Err(GalleryError::InvalidPath);
    }
    Ok(joined)
}

fn check_canonical(
    path: &GalleryPath,
    canonical_root: &Path,
    canonical: &Path,
) -> Result<(), GalleryError> {
    if canonical.starts_with(canonical_root) {
        return Ok(());
    }
    warn!(
        "Path {} resolves outside of {:?}: {:?}",
        path, canonical_root, canonical
    );
    Err(GalleryError::InvalidPath)
}

/// Join `path` under `root`, refusing anything that ends up outside of it.
///
/// The lexical check runs before any filesystem access. When the target
/// exists it is also canonicalized so a symlink cannot lead out of the root.
/// Blocking; request handlers use [`resolve_within_async`].
pub fn resolve_within(root: &Path, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
    let joined = join_within(root, path)?;

    if let (Ok(canonical_root), Ok(canonical)) = (root.canonicalize(), joined.canonicalize()) {
        check_canonical(path, &canonical_root, &canonical)?;
    }

    Ok(joined)
}

pub async fn resolve_within_async(
    root: &Path,
    path: &GalleryPath,
) -> Result<PathBuf, GalleryError> {
    let joined = join_within(root, path)?;

    if let (Ok(canonical_root), Ok(canonical)) = (
        tokio::fs::canonicalize(root).await,
        tokio::fs::canonicalize(&joined).await,
    ) {
        check_canonical(path, &canonical_root, &canonical)?;
    }

    Ok(joined)
}

/// Pair of roots whose subtrees mirror each other.
#[derive(Debug, Clone)]
pub struct PathMirror {
    source_root: PathBuf,
    thumbnail_root: PathBuf,
}

impl PathMirror {
    pub fn new(source_root: impl Into<PathBuf>, thumbnail_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            thumbnail_root: thumbnail_root.into(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn thumbnail_root(&self) -> &Path {
        &self.thumbnail_root
    }

    pub fn to_thumbnail_path(&self, source: &GalleryPath) -> Result<GalleryPath, GalleryError> {
        resolve_within(&self.thumbnail_root, source)?;
        Ok(source.clone())
    }

    pub fn to_source_path(&self, thumbnail: &GalleryPath) -> Result<GalleryPath, GalleryError> {
        resolve_within(&self.source_root, thumbnail)?;
        Ok(thumbnail.clone())
    }

    pub fn source_file(&self, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
        resolve_within(&self.source_root, path)
    }

    pub fn thumbnail_file(&self, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
        resolve_within(&self.thumbnail_root, path)
    }

    pub async fn locate_source(&self, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
        resolve_within_async(&self.source_root, path).await
    }

    pub async fn locate_thumbnail(&self, path: &GalleryPath) -> Result<PathBuf, GalleryError> {
        resolve_within_async(&self.thumbnail_root, path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_normalizes_separators() {
        let path = GalleryPath::parse("/vacation\\2024//./beach.jpg").unwrap();
        assert_eq!(path.segments(), ["vacation", "2024", "beach.jpg"]);
        assert_eq!(path.to_string(), "vacation/2024/beach.jpg");
        assert_eq!(path.file_name(), Some("beach.jpg"));
    }

    #[test]
    fn test_parse_root_forms() {
        assert!(GalleryPath::parse("").unwrap().is_root());
        assert!(GalleryPath::parse("/").unwrap().is_root());
        assert!(GalleryPath::parse("./").unwrap().is_root());
    }

    #[test]
    fn test_parse_rejects_traversal_and_absolute_markers() {
        for raw in [
            "..",
            "../secret.jpg",
            "vacation/../../etc/passwd",
            "vacation\\..\\..\\secret.jpg",
            "//server/share/a.jpg",
            "\\\\server\\share",
            "a\0b.jpg",
        ] {
            assert!(
                matches!(GalleryPath::parse(raw), Err(GalleryError::InvalidPath)),
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[cfg(windows)]
    #[test]
    fn test_parse_rejects_drive_prefix() {
        for raw in ["C:\\Windows\\win.ini", "c:/photos/a.jpg"] {
            assert!(GalleryPath::parse(raw).is_err(), "{:?}", raw);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_colon_names_parse_like_walked_names() {
        let parsed = GalleryPath::parse("a:b.jpg").unwrap();
        let walked = GalleryPath::from_relative(Path::new("a:b.jpg")).unwrap();
        assert_eq!(parsed, walked);

        let nested = GalleryPath::parse("c:/photos/a.jpg").unwrap();
        assert_eq!(nested.segments(), ["c:", "photos", "a.jpg"]);
    }

    #[test]
    fn test_from_relative_rejects_parent_components() {
        assert!(GalleryPath::from_relative(Path::new("a/b.jpg")).is_ok());
        assert!(GalleryPath::from_relative(Path::new("../b.jpg")).is_err());
        assert!(GalleryPath::from_relative(Path::new("/abs/b.jpg")).is_err());
    }

    #[test]
    fn test_parent_and_child() {
        let path = GalleryPath::parse("a/b/c.jpg").unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "a/b");
        assert!(GalleryPath::root().parent().is_none());
        assert_eq!(
            path.parent().unwrap().child("d.png").unwrap().to_string(),
            "a/b/d.png"
        );
        assert!(GalleryPath::root().child("..").is_err());
    }

    #[test]
    fn test_url_path_encodes_segments() {
        let path = GalleryPath::parse("summer trip/día #1.jpg").unwrap();
        assert_eq!(path.url_path(), "summer%20trip/d%C3%ADa%20%231.jpg");
    }

    #[test]
    fn test_mirror_round_trip() {
        let mirror = PathMirror::new("/data/imgs", "/data/imgs-small");
        for raw in ["a.jpg", "vacation/a.jpg", "x/y/z/IMG_0001.JPEG", ""] {
            let path = GalleryPath::parse(raw).unwrap();
            let thumbnail = mirror.to_thumbnail_path(&path).unwrap();
            assert_eq!(mirror.to_source_path(&thumbnail).unwrap(), path);
        }
    }

    #[test]
    fn test_mirror_files_share_relative_path() {
        let mirror = PathMirror::new("/data/imgs", "/data/imgs-small");
        let path = GalleryPath::parse("vacation/a.jpg").unwrap();
        assert_eq!(
            mirror.source_file(&path).unwrap(),
            PathBuf::from("/data/imgs/vacation/a.jpg")
        );
        assert_eq!(
            mirror.thumbnail_file(&path).unwrap(),
            PathBuf::from("/data/imgs-small/vacation/a.jpg")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_root_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("imgs");
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.jpg"), b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();

        let path = GalleryPath::parse("escape/secret.jpg").unwrap();
        assert!(matches!(
            resolve_within(&root, &path),
            Err(GalleryError::InvalidPath)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_async_resolution_matches_blocking() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("imgs");
        let outside = temp_dir.path().join("outside");
        std::fs::create_dir_all(source.join("vacation")).unwrap();
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(source.join("vacation/a.jpg"), b"a").unwrap();
        std::os::unix::fs::symlink(&outside, source.join("escape")).unwrap();
        let mirror = PathMirror::new(&source, temp_dir.path().join("imgs-small"));

        let inside = GalleryPath::parse("vacation/a.jpg").unwrap();
        assert_eq!(
            mirror.locate_source(&inside).await.unwrap(),
            mirror.source_file(&inside).unwrap()
        );
        assert_eq!(
            mirror.locate_thumbnail(&inside).await.unwrap(),
            temp_dir.path().join("imgs-small/vacation/a.jpg")
        );

        let escaping = GalleryPath::parse("escape/secret.jpg").unwrap();
        std::fs::write(outside.join("secret.jpg"), b"secret").unwrap();
        assert!(matches!(
            mirror.locate_source(&escaping).await,
            Err(GalleryError::InvalidPath)
        ));
    }

    #[test]
    fn test_missing_target_resolves_lexically() {
        let temp_dir = TempDir::new().unwrap();
        let path = GalleryPath::parse("not/yet/there.jpg").unwrap();
        assert_eq!(
            resolve_within(temp_dir.path(), &path).unwrap(),
            temp_dir.path().join("not/yet/there.jpg")
        );
    }
}
