use super::{GalleryError, GalleryPath, GalleryQuery, browse_url};
use crate::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{Html, IntoResponse, Response},
};
use tracing::debug;

fn wants_json(query: &GalleryQuery, headers: &HeaderMap) -> bool {
    if let Some(format) = &query.format {
        return format.eq_ignore_ascii_case("json");
    }

    headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false)
}

pub async fn gallery_root_handler(
    State(app_state): State<AppState>,
    Query(query): Query<GalleryQuery>,
    headers: HeaderMap,
) -> Response {
    render_listing(&app_state, "", &query, &headers).await
}

pub async fn gallery_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<GalleryQuery>,
    headers: HeaderMap,
) -> Response {
    render_listing(&app_state, &path, &query, &headers).await
}

async fn render_listing(
    app_state: &AppState,
    raw_path: &str,
    query: &GalleryQuery,
    headers: &HeaderMap,
) -> Response {
    let result: Result<Response, GalleryError> = async {
        let path = GalleryPath::parse(raw_path)?;
        let page = query.page.unwrap_or(1);
        let gallery = &app_state.gallery;

        let listing = gallery.list_directory(&path, page).await?;
        debug!(
            "Listing {}: {} directories, {} images on page {}",
            path,
            listing.directories.len(),
            listing.images.len(),
            page
        );

        if wants_json(query, headers) {
            return Ok(Json(listing).into_response());
        }

        let base_url = browse_url(&path);
        let page_title = path
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| app_state.config.app.name.clone());
        let is_empty = path.is_root() && listing.total_images == 0 && listing.directories.is_empty();

        let globals = liquid::object!({
            "app_name": app_state.config.app.name,
            "page_title": page_title,
            "gallery_path": path.to_string(),
            "breadcrumbs": gallery.build_breadcrumbs(&path),
            "parent_url": listing.parent_url,
            "directories": listing.directories,
            "images": listing.images,
            "is_empty": is_empty,
            "current_page": listing.current_page,
            "total_pages": listing.total_pages,
            "has_prev": listing.has_prev,
            "has_next": listing.has_next,
            "prev_url": format!("{}?page={}", base_url, page.saturating_sub(1).max(1)),
            "next_url": format!("{}?page={}", base_url, page + 1),
        });

        let html = app_state
            .template_engine
            .render_template("gallery.html.liquid", globals)
            .await
            .map_err(GalleryError::Template)?;

        Ok(Html(html).into_response())
    }
    .await;

    result.unwrap_or_else(IntoResponse::into_response)
}

pub async fn image_detail_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    let result: Result<Response, GalleryError> = async {
        let path = GalleryPath::parse(&path)?;
        let image = app_state.gallery.get_image(&path).await?;
        let back_url = path
            .parent()
            .map(|parent| browse_url(&parent))
            .unwrap_or_else(|| "/".to_string());

        let globals = liquid::object!({
            "app_name": app_state.config.app.name,
            "image": image,
            "back_url": back_url,
        });

        let html = app_state
            .template_engine
            .render_template("image.html.liquid", globals)
            .await
            .map_err(GalleryError::Template)?;

        Ok(Html(html).into_response())
    }
    .await;

    result.unwrap_or_else(IntoResponse::into_response)
}

pub async fn thumbnail_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    app_state.gallery.serve_thumbnail(&path).await
}

pub async fn original_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    app_state.gallery.serve_original(&path).await
}
