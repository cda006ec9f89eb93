//! 共享暂存缓冲区：所有传输复用同一块内存，整段传输期间持锁。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time;

use crate::error::FileError;

/// Exclusive access to the scratch buffer for the lifetime of one transfer.
pub type ScratchGuard = OwnedMutexGuard<Box<[u8]>>;

/// Fixed-capacity buffer shared by every transfer.
#[derive(Debug)]
pub struct ScratchBuffer {
    buf: Arc<Mutex<Box<[u8]>>>,
    capacity: usize,
}

impl ScratchBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Arc::new(Mutex::new(vec![0u8; capacity].into_boxed_slice())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 在给定时间内等待缓冲区空闲，超时返回 `Busy`。
    pub async fn acquire(&self, wait: Duration) -> Result<ScratchGuard, FileError> {
        time::timeout(wait, self.buf.clone().lock_owned())
            .await
            .map_err(|_| FileError::Busy)
    }
}
