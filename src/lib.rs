use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod gallery;
pub mod media;
pub mod startup_checks;
pub mod templating;
pub mod thumbnails;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub templates: TemplateConfig,
    pub gallery: GalleryConfig,
    pub thumbnails: ThumbnailConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
}

/// Directory searched for template overrides. Templates not found there fall
/// back to the built-in versions.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub source_directory: PathBuf,
    pub thumbnail_directory: PathBuf,
    pub images_per_page: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Length in pixels of the longer edge of a generated thumbnail.
    pub max_dimension: u32,
    /// Recognized image extensions, compared case-insensitively.
    pub extensions: Vec<String>,
    /// Worker threads for generation; 0 uses one per CPU.
    pub threads: usize,
    pub jpeg_quality: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Image Gallery".to_string(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("templates"),
        }
    }
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            source_directory: PathBuf::from("imgs"),
            thumbnail_directory: PathBuf::from("imgs-small"),
            images_per_page: 100,
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dimension: 300,
            extensions: media::DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            threads: 0,
            jpeg_quality: 85,
        }
    }
}

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub template_engine: Arc<templating::TemplateEngine>,
    pub gallery: gallery::SharedGallery,
    pub config: Config,
}

pub async fn create_app(config: Config) -> Router {
    let template_engine = Arc::new(templating::TemplateEngine::new(
        config.templates.directory.clone(),
    ));

    let gallery = Arc::new(gallery::Gallery::new(
        config.gallery.clone(),
        media::ImageExtensions::new(&config.thumbnails.extensions),
    ));

    let app_state = AppState {
        template_engine,
        gallery,
        config: config.clone(),
    };

    Router::new()
        .route("/", axum::routing::get(gallery::gallery_root_handler))
        .route("/browse", axum::routing::get(gallery::gallery_root_handler))
        .route("/browse/", axum::routing::get(gallery::gallery_root_handler))
        .route(
            "/browse/{*path}",
            axum::routing::get(gallery::gallery_handler),
        )
        .route(
            "/thumb/{*path}",
            axum::routing::get(gallery::thumbnail_handler),
        )
        .route(
            "/full/{*path}",
            axum::routing::get(gallery::original_handler),
        )
        .route(
            "/image/{*path}",
            axum::routing::get(gallery::image_detail_handler),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        query = ?request.uri().query(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
