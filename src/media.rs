use std::path::Path;

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Set of file extensions treated as images, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtensions {
    extensions: Vec<String>,
}

impl ImageExtensions {
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        let mut extensions: Vec<String> = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        extensions.sort();
        extensions.dedup();
        Self { extensions }
    }

    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|known| *known == ext)
            })
            .unwrap_or(false)
    }

    pub fn is_image_name(&self, file_name: &str) -> bool {
        self.is_image(Path::new(file_name))
    }
}

impl Default for ImageExtensions {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS)
    }
}

pub fn media_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

pub(crate) fn is_hidden(file_name: &str) -> bool {
    file_name.starts_with('.')
}
