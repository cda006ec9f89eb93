//! 路由注册：静态资源、列表接口与三个文件传输处理器。

use axum::extract::{DefaultBodyLimit, Extension, Path};
use axum::routing::{MethodRouter, get, post};
use axum::{Router, middleware};
use std::sync::Arc;

use crate::http::{add_security_headers, reject_empty_name};
use crate::server::FileServer;
use crate::{delete, download, frontend, listing, upload, version};

pub fn build_router(server: Arc<FileServer>) -> Router {
    Router::new()
        .route("/", get(frontend::serve_index))
        .route("/index.html", get(frontend::serve_index))
        .route("/styles.css", get(frontend::serve_asset))
        .route("/code.js", get(frontend::serve_asset))
        .route("/favicon.ico", get(frontend::serve_asset))
        .route("/api/files", get(listing::list_files))
        .route("/api/version", get(version::get_version_info))
        .route(
            "/upload",
            post(reject_empty_name).merge(download_exact("upload")),
        )
        .route(
            "/upload/",
            post(reject_empty_name).merge(download_exact("upload/")),
        )
        .route(
            "/upload/{*path}",
            post(upload::upload_file)
                .layer(DefaultBodyLimit::disable())
                .merge(download_under("upload")),
        )
        .route(
            "/delete",
            post(reject_empty_name).merge(download_exact("delete")),
        )
        .route(
            "/delete/",
            post(reject_empty_name).merge(download_exact("delete/")),
        )
        .route(
            "/delete/{*path}",
            post(delete::delete_file).merge(download_under("delete")),
        )
        .route("/{*path}", get(download::download_file))
        .layer(middleware::from_fn(add_security_headers))
        .layer(Extension(server))
}

/// GET under `/upload/` or `/delete/` is still a download of a stored path;
/// the route has stripped `prefix`, so put it back.
fn download_under(prefix: &'static str) -> MethodRouter {
    get(
        move |Path(path): Path<String>, server: Extension<Arc<FileServer>>| {
            download::download_file(Path(format!("{prefix}/{path}")), server)
        },
    )
}

fn download_exact(path: &'static str) -> MethodRouter {
    get(move |server: Extension<Arc<FileServer>>| {
        download::download_file(Path(path.to_string()), server)
    })
}
