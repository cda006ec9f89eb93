//! 文件下载：经暂存缓冲区分块流式发送。

use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use httpdate::fmt_http_date;
use std::io;
use std::sync::Arc;
use tokio::fs::{self, File};
use tracing::{debug, info, warn};

use crate::content_type;
use crate::error::FileError;
use crate::frontend;
use crate::server::FileServer;
use crate::transfer::{BodySink, body_from_channel, stream_out};

/// 下载单个文件；以 `/` 结尾的目录路径交给静态列表页。
pub async fn download_file(
    Path(path): Path<String>,
    Extension(server): Extension<Arc<FileServer>>,
) -> Result<Response, FileError> {
    if path.ends_with('/') {
        return frontend::serve_index().await;
    }
    let requested = format!("/{path}");
    let limits = server.limits();
    let target = server
        .storage()
        .resolve_path_checked(&requested, false)
        .await?;
    let metadata = fs::metadata(&target).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => FileError::NotFound,
        _ => FileError::OpenFailure(err),
    })?;

    if metadata.is_dir() {
        warn!(path = requested, "refusing to send a directory");
        return Err(FileError::OpenFailure(io::Error::other("is a directory")));
    }

    let mut scratch = server.scratch().acquire(limits.transfer_wait).await?;
    // 等待缓冲区期间文件可能已被删除。
    let mut file = File::open(&target).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => FileError::NotFound,
        _ => {
            warn!(path = requested, error = %err, "failed to open existing file");
            FileError::OpenFailure(err)
        }
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type::classify(&requested)),
    );
    if let Ok(modified) = metadata.modified() {
        headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&fmt_http_date(modified))
                .map_err(|err| FileError::Internal(err.to_string()))?,
        );
    }

    info!(path = requested, size = metadata.len(), "sending file");
    let (mut sink, rx) = BodySink::channel();
    let chunk_timeout = limits.chunk_timeout;
    tokio::spawn(async move {
        let outcome = stream_out(&mut file, &mut sink, &mut scratch[..], chunk_timeout).await;
        drop(file);
        match outcome {
            Ok(sent) => debug!(path = requested, bytes = sent, "file sending complete"),
            Err(FileError::ReadFailure(err)) => {
                warn!(path = requested, error = %err, "file read failed mid-transfer");
                sink.abort(err).await;
            }
            Err(err) => warn!(path = requested, error = %err, "file sending failed"),
        }
    });

    Ok((StatusCode::OK, headers, body_from_channel(rx)).into_response())
}
