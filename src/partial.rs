//! 上传目标文件的独占创建与失败清理。

use std::future::Future;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::error::FileError;

/// 上传目标的写入端，提交时需要落盘。
pub trait DurableWrite: AsyncWrite + Unpin + Send {
    fn sync(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

impl DurableWrite for File {
    async fn sync(&mut self) -> io::Result<()> {
        self.sync_all().await
    }
}

/// 新建的上传目标文件；未提交前被丢弃时会删除自身。
pub struct PartialFile<W = File> {
    path: PathBuf,
    file: W,
    armed: bool,
}

impl PartialFile {
    /// 以独占方式创建文件，目标已存在时返回 `AlreadyExists`。
    pub async fn create(path: &Path) -> Result<Self, FileError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => FileError::AlreadyExists,
                _ => FileError::CreateFailure(err),
            })?;
        Ok(Self::with_writer(path.to_path_buf(), file))
    }
}

impl<W: DurableWrite> PartialFile<W> {
    /// 接管 `path` 处刚创建的文件，写入经由 `file`。
    pub fn with_writer(path: PathBuf, file: W) -> Self {
        Self {
            path,
            file,
            armed: true,
        }
    }

    pub fn file_mut(&mut self) -> &mut W {
        &mut self.file
    }

    /// 关闭并删除未完成的文件。
    pub async fn discard(mut self) {
        self.armed = false;
        let path = std::mem::take(&mut self.path);
        drop(self);
        if let Err(err) = fs::remove_file(&path).await {
            warn!(path = %path.display(), error = %err, "failed to remove partial file");
        }
    }

    /// 刷盘后保留文件；刷盘失败同样视为写入失败并清理。
    pub async fn commit(mut self) -> Result<(), FileError> {
        let synced = async {
            self.file.flush().await?;
            self.file.sync().await
        }
        .await;
        match synced {
            Ok(()) => {
                self.armed = false;
                Ok(())
            }
            Err(err) => {
                self.discard().await;
                Err(FileError::WriteFailure(err))
            }
        }
    }
}

impl<W> Drop for PartialFile<W> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Handler future dropped mid-transfer.
        match std::fs::remove_file(&self.path) {
            Ok(()) => warn!(path = %self.path.display(), "removed abandoned partial file"),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to remove abandoned partial file")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_refuses_existing_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("taken.txt");
        std::fs::write(&path, b"original").expect("write");

        let result = PartialFile::create(&path).await;
        assert!(matches!(result, Err(FileError::AlreadyExists)));
        assert_eq!(std::fs::read(&path).expect("read"), b"original");
    }

    #[tokio::test]
    async fn discard_removes_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("half.bin");
        let mut partial = PartialFile::create(&path).await.expect("create");
        partial.file_mut().write_all(b"half").await.expect("write");
        partial.discard().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn dropping_uncommitted_file_removes_it() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("dropped.bin");
        let partial = PartialFile::create(&path).await.expect("create");
        drop(partial);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn commit_keeps_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("done.bin");
        let mut partial = PartialFile::create(&path).await.expect("create");
        partial.file_mut().write_all(b"done").await.expect("write");
        partial.commit().await.expect("commit");
        assert_eq!(std::fs::read(&path).expect("read"), b"done");
    }
}
