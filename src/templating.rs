use std::{collections::HashMap, path::PathBuf, sync::Arc, time::SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// Templates compiled into the binary, used when the template directory does
/// not provide an override.
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("_header.html.liquid", include_str!("templates/_header.html.liquid")),
    ("_footer.html.liquid", include_str!("templates/_footer.html.liquid")),
    ("gallery.html.liquid", include_str!("templates/gallery.html.liquid")),
    ("image.html.liquid", include_str!("templates/image.html.liquid")),
];

pub struct TemplateEngine {
    template_dir: PathBuf,
    cache: Arc<RwLock<HashMap<String, CachedTemplate>>>,
}

struct CachedTemplate {
    content: String,
    modified: SystemTime,
}

impl TemplateEngine {
    pub fn new(template_dir: PathBuf) -> Self {
        Self {
            template_dir,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn builtin(name: &str) -> Option<&'static str> {
        BUILTIN_TEMPLATES
            .iter()
            .find(|(builtin_name, _)| *builtin_name == name)
            .map(|(_, content)| *content)
    }

    async fn load_template(&self, name: &str) -> Result<String, String> {
        let template_path = self.template_dir.join(name);

        let modified = match tokio::fs::metadata(&template_path).await {
            Ok(metadata) => metadata
                .modified()
                .map_err(|e| format!("Failed to get modified time: {}", e))?,
            Err(_) => {
                return Self::builtin(name)
                    .map(str::to_string)
                    .ok_or_else(|| format!("Template not found: {}", name));
            }
        };

        let mut cache = self.cache.write().await;

        if let Some(cached) = cache.get(name)
            && cached.modified >= modified
        {
            debug!("Using cached template for {}", name);
            return Ok(cached.content.clone());
        }

        info!("Loading template: {:?}", template_path);

        let content = tokio::fs::read_to_string(&template_path)
            .await
            .map_err(|e| format!("Failed to read template {}: {}", name, e))?;

        cache.insert(
            name.to_string(),
            CachedTemplate {
                content: content.clone(),
                modified,
            },
        );

        Ok(content)
    }

    pub async fn render_template(
        &self,
        template_name: &str,
        globals: liquid::Object,
    ) -> Result<String, String> {
        let header_content = self
            .load_template("_header.html.liquid")
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load header: {}", e);
                String::new()
            });

        let footer_content = self
            .load_template("_footer.html.liquid")
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load footer: {}", e);
                String::new()
            });

        let template_content = self.load_template(template_name).await?;

        let parser = liquid::ParserBuilder::with_stdlib()
            .build()
            .map_err(|e| format!("Failed to create parser: {}", e))?;

        let template = parser
            .parse(&template_content)
            .map_err(|e| format!("Failed to parse template: {}", e))?;

        let mut full_globals = globals;
        full_globals.insert(
            "header".into(),
            liquid::model::Value::Scalar(header_content.into()),
        );
        full_globals.insert(
            "footer".into(),
            liquid::model::Value::Scalar(footer_content.into()),
        );

        template
            .render(&full_globals)
            .map_err(|e| format!("Failed to render template: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_builtin_template_used_without_override() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(temp_dir.path().to_path_buf());

        let html = engine
            .render_template(
                "image.html.liquid",
                liquid::object!({
                    "app_name": "Test",
                    "back_url": "/",
                    "image": {
                        "name": "a<b>.jpg",
                        "full_url": "/full/a.jpg",
                        "media_type": "image/jpeg",
                        "size": 10,
                    },
                }),
            )
            .await
            .unwrap();

        assert!(html.contains("a&lt;b&gt;.jpg"));
        assert!(html.contains(r#"src="/full/a.jpg""#));
        assert!(html.contains("site-header"));
    }

    #[tokio::test]
    async fn test_directory_override_wins() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("image.html.liquid"),
            "custom {{ image.name }}",
        )
        .unwrap();
        let engine = TemplateEngine::new(temp_dir.path().to_path_buf());

        let html = engine
            .render_template(
                "image.html.liquid",
                liquid::object!({ "image": { "name": "x.jpg" } }),
            )
            .await
            .unwrap();

        assert_eq!(html, "custom x.jpg");
    }

    #[tokio::test]
    async fn test_unknown_template_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let engine = TemplateEngine::new(temp_dir.path().to_path_buf());
        assert!(
            engine
                .render_template("missing.html.liquid", liquid::object!({}))
                .await
                .is_err()
        );
    }
}
