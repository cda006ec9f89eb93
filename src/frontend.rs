//! 嵌入式静态资源：列表页、样式、脚本与图标。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, Uri, header};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;
use std::borrow::Cow;

use crate::error::FileError;

#[derive(RustEmbed)]
#[folder = "assets"]
/// 嵌入的前端资源。
pub struct Assets;

pub const INDEX_PAGE: &str = "index.html";

/// 按路径查找资源，返回内容与 MIME 类型。
pub fn lookup(path: &str) -> Option<(Cow<'static, [u8]>, mime_guess::Mime)> {
    let asset = Assets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some((asset.data, mime))
}

/// 返回根目录或子目录对应的列表页。
pub async fn serve_index() -> Result<Response, FileError> {
    load_asset(INDEX_PAGE)
}

/// 按请求路径返回对应的静态资源。
pub async fn serve_asset(uri: Uri) -> Result<Response, FileError> {
    load_asset(uri.path().trim_start_matches('/'))
}

fn load_asset(path: &str) -> Result<Response, FileError> {
    let (data, mime) = lookup(path).ok_or(FileError::NotFound)?;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|err| FileError::Internal(err.to_string()))?,
    );
    Ok((headers, AxumBody::from(data.into_owned())).into_response())
}
