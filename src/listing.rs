//! 目录列表接口，供静态列表页渲染。

use axum::extract::{Extension, Query};
use axum::response::Json as JsonResponse;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::error::FileError;
use crate::server::FileServer;
use crate::storage::FileEntry;

#[derive(Deserialize)]
pub(crate) struct ListQuery {
    path: Option<String>,
}

/// 列出目录内容。
pub async fn list_files(
    Query(query): Query<ListQuery>,
    Extension(server): Extension<Arc<FileServer>>,
) -> Result<JsonResponse<Vec<FileEntry>>, FileError> {
    let entries = server.storage().list_dir(query.path.as_deref()).await?;
    info!(
        path = query.path.as_deref().unwrap_or("/"),
        count = entries.len(),
        "list files"
    );
    Ok(JsonResponse(entries))
}
