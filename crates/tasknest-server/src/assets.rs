//! Static assets embedded at compile time.

use axum::{
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;

/// Stylesheets and scripts from `static/`.
#[derive(Embed)]
#[folder = "static"]
struct StaticAssets;

/// Serve `/static/{*path}`.
pub async fn serve_static(Path(path): Path<String>) -> Response {
    serve_file(&path)
}

fn serve_file(path: &str) -> Response {
    let Some(content) = StaticAssets::get(path) else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref()),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        content.data.into_owned(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_asset() {
        let response = serve_file("css/app.css");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }

    #[test]
    fn test_missing_asset() {
        assert_eq!(serve_file("css/nope.css").status(), StatusCode::NOT_FOUND);
        assert_eq!(serve_file("../Cargo.toml").status(), StatusCode::NOT_FOUND);
    }
}
