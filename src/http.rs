//! HTTP 辅助工具：CORS、安全头、文件名校验与重定向响应。

use axum::body::Body as AxumBody;
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::{
    middleware,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::error::FileError;

/// 构建 CORS Layer（支持逗号分隔的来源列表）。
pub fn build_cors_layer(cors_origins: Option<&str>) -> Option<CorsLayer> {
    let origins = cors_origins?
        .split(',')
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "invalid cors origin");
                None
            }
        })
        .collect::<Vec<_>>();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// 添加基础安全响应头。
pub async fn add_security_headers(
    request: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, StatusCode> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}

/// 校验上传/删除路径指向一个文件（非空且不以 `/` 结尾），返回以 `/` 开头的请求路径。
pub fn leaf_request_path(path: &str) -> Result<String, FileError> {
    if path.is_empty() || path.ends_with('/') {
        warn!(path, "invalid file name");
        return Err(FileError::InvalidName);
    }
    Ok(format!("/{path}"))
}

/// 成功后重定向回根目录列表。
pub fn see_other(message: &'static str) -> Response {
    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, HeaderValue::from_static("/"))],
        message,
    )
        .into_response()
}

/// `/upload/`、`/delete/` 等没有文件名的请求。
pub async fn reject_empty_name() -> FileError {
    FileError::InvalidName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_path_requires_a_file_name() {
        assert!(matches!(leaf_request_path(""), Err(FileError::InvalidName)));
        assert!(matches!(
            leaf_request_path("docs/"),
            Err(FileError::InvalidName)
        ));
        assert_eq!(leaf_request_path("docs/a.txt").ok().as_deref(), Some("/docs/a.txt"));
    }

    #[test]
    fn see_other_points_at_root() {
        let response = see_other("File uploaded successfully");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION),
            Some(&HeaderValue::from_static("/"))
        );
    }

    #[test]
    fn cors_layer_ignores_blank_origin_list() {
        assert!(build_cors_layer(None).is_none());
        assert!(build_cors_layer(Some(" , ")).is_none());
        assert!(build_cors_layer(Some("http://localhost:5173")).is_some());
    }
}
