//! 文件服务上下文：存储根目录、暂存缓冲区与传输限制。
//!
//! 每个存储根目录同一时刻只允许存在一个 `FileServer`，重复构造会在
//! 构造函数处返回 `AlreadyStarted`，实例释放后才可重新构造。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, PoisonError};
use tokio::fs;
use tracing::info;

use crate::config::TransferLimits;
use crate::error::FileError;
use crate::scratch::ScratchBuffer;
use crate::storage::Storage;

static CLAIMED_ROOTS: LazyLock<Mutex<HashSet<PathBuf>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

#[derive(Debug)]
pub struct FileServer {
    storage: Storage,
    scratch: ScratchBuffer,
    limits: TransferLimits,
}

impl FileServer {
    /// 创建存储根目录并占用它。
    pub async fn start(
        root: impl AsRef<Path>,
        scratch_size: usize,
        limits: TransferLimits,
    ) -> Result<Self, FileError> {
        fs::create_dir_all(root.as_ref())
            .await
            .map_err(|err| FileError::Internal(err.to_string()))?;
        let root = fs::canonicalize(root.as_ref())
            .await
            .map_err(|err| FileError::Internal(err.to_string()))?;

        {
            let mut claimed = CLAIMED_ROOTS.lock().unwrap_or_else(PoisonError::into_inner);
            if !claimed.insert(root.clone()) {
                return Err(FileError::AlreadyStarted(root));
            }
        }

        let scratch = ScratchBuffer::new(scratch_size);
        info!(
            root = %root.display(),
            scratch_size = scratch.capacity(),
            max_file_size = limits.max_file_size,
            "file server context ready"
        );
        Ok(Self {
            storage: Storage::new(root, limits.max_path_len),
            scratch,
            limits,
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn scratch(&self) -> &ScratchBuffer {
        &self.scratch
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        CLAIMED_ROOTS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(self.storage.root_path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn second_start_on_same_root_fails() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("storage");
        let first = FileServer::start(&root, 64, TransferLimits::default())
            .await
            .expect("first start");

        let second = FileServer::start(&root, 64, TransferLimits::default()).await;
        assert!(matches!(second, Err(FileError::AlreadyStarted(_))));

        drop(first);
        assert!(
            FileServer::start(&root, 64, TransferLimits::default())
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn start_creates_missing_root() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("nested").join("storage");
        let server = FileServer::start(&root, 64, TransferLimits::default())
            .await
            .expect("start");
        assert!(server.storage().root_path().is_dir());
        assert_eq!(server.scratch().capacity(), 64);
    }
}
