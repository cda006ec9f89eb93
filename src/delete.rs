//! 文件删除。

use axum::extract::{Extension, Path};
use axum::response::Response;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::error::FileError;
use crate::http::{leaf_request_path, see_other};
use crate::server::FileServer;

/// 删除单个已存在的文件，不处理目录。
pub async fn delete_file(
    Path(path): Path<String>,
    Extension(server): Extension<Arc<FileServer>>,
) -> Result<Response, FileError> {
    let requested = leaf_request_path(&path)?;
    let target = server
        .storage()
        .resolve_path_checked(&requested, false)
        .await
        .map_err(|err| match FileError::from(err) {
            FileError::NotFound => FileError::DoesNotExist,
            other => other,
        })?;
    let Some(metadata) = server.storage().probe(&target).await? else {
        warn!(path = requested, "file does not exist");
        return Err(FileError::DoesNotExist);
    };
    if metadata.is_dir() {
        warn!(path = requested, "refusing to delete a directory");
        return Err(FileError::InvalidName);
    }

    fs::remove_file(&target).await.map_err(|err| {
        warn!(path = requested, error = %err, "failed to delete file");
        FileError::RemoveFailure(err)
    })?;
    info!(path = requested, "file deleted");
    Ok(see_other("File deleted successfully"))
}
