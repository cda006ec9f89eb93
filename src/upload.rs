//! 文件上传：独占创建、大小限制、失败时删除未完成文件。

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, header};
use axum::response::Response;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::TransferLimits;
use crate::error::FileError;
use crate::http::{leaf_request_path, see_other};
use crate::partial::{DurableWrite, PartialFile};
use crate::server::FileServer;
use crate::transfer::{BodySource, ChunkSource, receive_into};

/// 接收请求体并写入新文件。
///
/// 前置检查（文件名、是否已存在、声明长度）失败时不会创建任何文件；
/// 文件创建后的任何失败都会先删除该文件再响应。
pub async fn upload_file(
    Path(path): Path<String>,
    headers: HeaderMap,
    Extension(server): Extension<Arc<FileServer>>,
    body: AxumBody,
) -> Result<Response, FileError> {
    let requested = leaf_request_path(&path)?;
    let limits = server.limits();
    // 父目录缺失时目标同样不存在，留给创建步骤报错。
    let target = server
        .storage()
        .resolve_path_checked(&requested, true)
        .await?;
    if server.storage().probe(&target).await?.is_some() {
        warn!(path = requested, "file already exists");
        return Err(FileError::AlreadyExists);
    }

    let declared = declared_length(&headers)?;
    if declared > limits.max_file_size {
        warn!(
            path = requested,
            declared,
            limit = limits.max_file_size,
            "file too large"
        );
        return Err(FileError::TooLarge {
            declared,
            limit: limits.max_file_size,
        });
    }

    let mut scratch = server.scratch().acquire(limits.transfer_wait).await?;
    let partial = PartialFile::create(&target).await.inspect_err(|err| {
        warn!(path = requested, error = %err, "failed to create file");
    })?;

    info!(
        path = requested,
        declared,
        chunk = scratch.len(),
        "receiving file"
    );
    let mut source = BodySource::new(body);
    store_body(partial, &mut source, &mut scratch[..], declared, limits)
        .await
        .inspect_err(|err| {
            warn!(path = requested, error = %err, "file reception failed");
        })?;

    info!(path = requested, bytes = declared, "file reception complete");
    Ok(see_other("File uploaded successfully"))
}

/// 把 `declared` 字节收进已创建的目标文件并落盘；失败时先删除该文件。
async fn store_body<S, W>(
    mut partial: PartialFile<W>,
    source: &mut S,
    buf: &mut [u8],
    declared: u64,
    limits: &TransferLimits,
) -> Result<(), FileError>
where
    S: ChunkSource,
    W: DurableWrite,
{
    let received = receive_into(
        source,
        partial.file_mut(),
        buf,
        declared,
        limits.chunk_timeout,
        limits.recv_retries,
    )
    .await;
    if let Err(err) = received {
        partial.discard().await;
        return Err(err);
    }
    partial.commit().await
}

fn declared_length(headers: &HeaderMap) -> Result<u64, FileError> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .ok_or(FileError::LengthRequired)
}
