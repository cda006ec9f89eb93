//! 文件传输错误分类及其 HTTP 响应映射。

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use std::io::{self, ErrorKind};
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found")]
    NotFound,
    #[error("file does not exist")]
    DoesNotExist,
    #[error("file already exists")]
    AlreadyExists,
    #[error("invalid file name")]
    InvalidName,
    #[error("declared length {declared} exceeds limit {limit}")]
    TooLarge { declared: u64, limit: u64 },
    #[error("missing content length")]
    LengthRequired,
    #[error("resolved path exceeds {limit} bytes")]
    PathTooLong { limit: usize },
    #[error("path escapes storage root")]
    OutsideRoot,
    #[error("failed to open file: {0}")]
    OpenFailure(io::Error),
    #[error("failed to create file: {0}")]
    CreateFailure(io::Error),
    #[error("failed to read file: {0}")]
    ReadFailure(io::Error),
    #[error("failed to write file: {0}")]
    WriteFailure(io::Error),
    #[error("failed to remove file: {0}")]
    RemoveFailure(io::Error),
    #[error("receive timed out")]
    ReceiveTimeout,
    #[error("receive timed out {attempts} times in a row")]
    Timeout { attempts: u32 },
    #[error("failed to receive body: {0}")]
    ReceiveFailure(String),
    #[error("failed to send chunk: {0}")]
    SendFailure(String),
    #[error("scratch buffer busy")]
    Busy,
    #[error("file server already started for {}", .0.display())]
    AlreadyStarted(PathBuf),
    #[error("{0}")]
    Internal(String),
}

impl FileError {
    pub fn status(&self) -> StatusCode {
        match self {
            FileError::NotFound => StatusCode::NOT_FOUND,
            FileError::DoesNotExist
            | FileError::AlreadyExists
            | FileError::InvalidName
            | FileError::TooLarge { .. }
            | FileError::PathTooLong { .. }
            | FileError::OutsideRoot => StatusCode::BAD_REQUEST,
            FileError::LengthRequired => StatusCode::LENGTH_REQUIRED,
            FileError::ReceiveTimeout | FileError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            FileError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            FileError::OpenFailure(_)
            | FileError::CreateFailure(_)
            | FileError::ReadFailure(_)
            | FileError::WriteFailure(_)
            | FileError::RemoveFailure(_)
            | FileError::ReceiveFailure(_)
            | FileError::SendFailure(_)
            | FileError::AlreadyStarted(_)
            | FileError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回给客户端的简短说明。
    pub fn reason(&self) -> String {
        match self {
            FileError::NotFound => String::new(),
            FileError::DoesNotExist => "File does not exist!".into(),
            FileError::AlreadyExists => "File already exists!".into(),
            FileError::InvalidName => "Invalid file name!".into(),
            FileError::TooLarge { limit, .. } => {
                format!("File size must be less than {}KB!", limit / 1024)
            }
            FileError::LengthRequired => "Content-Length required!".into(),
            FileError::PathTooLong { .. } => "File path too long!".into(),
            FileError::OutsideRoot => "Invalid file path!".into(),
            FileError::OpenFailure(_) | FileError::ReadFailure(_) => {
                "Failed to read existing file!".into()
            }
            FileError::CreateFailure(_) => "Failed to create file!".into(),
            FileError::WriteFailure(_) => "Failed to write file to storage!".into(),
            FileError::RemoveFailure(_) => "Failed to delete file!".into(),
            FileError::ReceiveTimeout | FileError::Timeout { .. } => {
                "Timed out receiving file!".into()
            }
            FileError::ReceiveFailure(_) => "Failed to receive file!".into(),
            FileError::SendFailure(_) => "Failed to send file!".into(),
            FileError::Busy => "Server busy, try again later!".into(),
            FileError::AlreadyStarted(_) => "File server already started!".into(),
            FileError::Internal(_) => "Internal server error!".into(),
        }
    }

    /// 上传中可重试的错误。
    pub fn is_retryable(&self) -> bool {
        matches!(self, FileError::ReceiveTimeout)
    }
}

impl IntoResponse for FileError {
    fn into_response(self) -> Response {
        let status = self.status();
        if matches!(self, FileError::NotFound) {
            return status.into_response();
        }
        let mut response = (status, self.reason()).into_response();
        if matches!(self, FileError::TooLarge { .. }) {
            // The body is left unread; let the transport drop the connection.
            response
                .headers_mut()
                .insert(header::CONNECTION, HeaderValue::from_static("close"));
        }
        response
    }
}

impl From<StorageError> for FileError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::InvalidPath => FileError::OutsideRoot,
            StorageError::PathTooLong { limit } => FileError::PathTooLong { limit },
            StorageError::Io(err) => match err.kind() {
                ErrorKind::NotFound => FileError::NotFound,
                _ => FileError::Internal(err.to_string()),
            },
        }
    }
}
